fn main() {
    if let Err(err) = bulk_onboard::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
