fn main() {
    fontget_cli::main();
}
