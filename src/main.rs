fn main() {
    if let Err(err) = tabular_insights::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
