fn main() -> std::process::ExitCode {
    rise_cli::run()
}
