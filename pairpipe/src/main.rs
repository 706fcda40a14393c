fn main() {
    if let Err(e) = pairpipe::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
