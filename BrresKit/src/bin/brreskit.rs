fn main() -> anyhow::Result<()> {
    brreskit::cli::run_cli()
}
