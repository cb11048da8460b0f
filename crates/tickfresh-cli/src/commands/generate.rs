use tickfresh_core::SeriesGenerator;

use crate::cli::GenerateArgs;
use crate::error::CliError;
use crate::output::Printer;

use super::{parse_series, SeriesReport};

pub fn run(args: &GenerateArgs, printer: &Printer) -> Result<(), CliError> {
    let (symbol, interval, horizon) = parse_series(&args.series)?;
    let generator = match args.seed {
        Some(seed) => SeriesGenerator::seeded(seed),
        None => SeriesGenerator::new(),
    };

    let series = generator.generate(&symbol, interval);
    printer.print(&SeriesReport::synthetic(&series, horizon))
}
