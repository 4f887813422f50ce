use clap::Parser;
use std::process;
use textfiddle::cli::format;
use textfiddle::cli::toml_config::{self, Overrides};
use textfiddle::cli::{self, Cli, Commands, OutputFormat};

fn main() {
    let args = Cli::parse();
    cli::setup_logging(args.verbose, args.quiet);

    match args.command {
        Commands::Run {
            paths,
            config,
            in_place,
            output_dir,
            layout,
            threads,
            pattern,
            no_recursive,
            format: output_format,
        } => {
            let overrides = Overrides {
                in_place,
                output_dir,
                layout,
                threads,
                pattern,
                no_recursive,
            };

            let plan = match toml_config::load(&config, &overrides) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("\x1b[31merror\x1b[0m: {}", e);
                    process::exit(2);
                }
            };

            let results =
                match cli::run_targets(&plan.config, &paths, &plan.pattern, plan.recursive) {
                    Ok(r) => r,
                    Err(e) => {
                        eprintln!("\x1b[31merror\x1b[0m: {}", e);
                        process::exit(2);
                    }
                };

            match output_format {
                OutputFormat::Pretty => format::print_pretty(&results),
                OutputFormat::Json => format::print_json(&results),
            }

            let has_failures = results.iter().any(|r| !r.success());
            process::exit(if has_failures { 1 } else { 0 });
        }
    }
}
