fn main() -> cli_recipe::SnafuReport<cli_recipe::Error> {
    cli_recipe::cli_recipe_main()
}
