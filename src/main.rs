fn main() -> anyhow::Result<()> {
    resqforce_lib::run()
}
