use clap::{Arg, ArgAction, Command, ValueHint};
use std::path::PathBuf;

/// The `habitat` command line interface.
pub fn build_cli() -> Command {
    Command::new("habitat")
        .version(clap::crate_version!())
        .author("Justin Sing <justincsing@gmail.com>")
        .about("Habitat suitability modelling from species points and raster layers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Cross-validate, fit and project every classifier for each species")
                .arg(
                    Arg::new("config")
                        .help("Path to the JSON run configuration file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data_root")
                        .short('d')
                        .long("data-root")
                        .help("Directory the data layout is resolved against. Overrides the configuration file.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output-dir")
                        .help("Directory the rasters and reports are written to. Overrides the configuration file.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("species")
                        .short('s')
                        .long("species")
                        .help("Comma separated species to process, e.g. 'lynx,wolf'")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("classifiers")
                        .short('c')
                        .long("classifiers")
                        .help("Comma separated classifier names, e.g. 'rf,logreg'")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("folds")
                        .short('k')
                        .long("folds")
                        .help("Number of cross-validation folds")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("present_only")
                        .long("present-only")
                        .help("Skip the future climate scenarios")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .help("Run the classifiers of a species concurrently")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("classifiers")
                .about("Print the classifier catalogue and its hyper-parameters as JSON")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Seed assigned to every classifier")
                        .default_value("42")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(Command::new("config").about("Print the default run configuration as JSON"))
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
}
