fn main() -> anyhow::Result<()> {
    eventsproc::cli::run()
}
