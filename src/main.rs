fn main() -> Result<(), Box<dyn std::error::Error>> {
    kongkow::cli::main()
}
