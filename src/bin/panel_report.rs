use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    msa_panel::example_apps::run_panel_report(std::env::args().skip(1))
}
