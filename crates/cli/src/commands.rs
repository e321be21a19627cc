//! Clap command tree definition.

use clap::{value_parser, Arg, ArgGroup, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("ldlookup")
        .about("Lookup and analysis of linkage disequilibrium (LD) between genetic variants")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(build_setup())
        .subcommand(build_get_variants_in_ld_with())
        .subcommand(build_get_variants_similar_to())
        .subcommand(build_get_variants_with_stats_like())
        .subcommand(build_get_variant_statistics())
        .subcommand(build_sample())
}

fn build_setup() -> Command {
    Command::new("setup")
        .about("Create a new lookup table")
        .arg(
            Arg::new("dir")
                .help("Directory in which to store the lookup table")
                .required(true),
        )
        .arg(
            Arg::new("src")
                .help("File from which to read LD data")
                .required(true),
        )
        .arg(
            Arg::new("delimiter")
                .short('d')
                .long("delimiter")
                .help("Character that separates columns of LD data")
                .value_parser(value_parser!(char))
                .default_value(" "),
        )
        .arg(
            Arg::new("index-id-column")
                .short('I')
                .long("index-id-column")
                .help("Column of LD data containing index variant IDs (1-based position or header name)")
                .default_value("SNP_A"),
        )
        .arg(
            Arg::new("ld-id-column")
                .short('L')
                .long("ld-id-column")
                .help("Column of LD data containing IDs of variants in LD with the index variant")
                .default_value("SNP_B"),
        )
        .arg(
            Arg::new("index-maf-column")
                .short('M')
                .long("index-maf-column")
                .help("Column of LD data containing MAFs of index variants")
                .default_value("MAF_A"),
        )
        .arg(
            Arg::new("r2-column")
                .short('R')
                .long("r2-column")
                .help("Column of LD data containing r-squared values")
                .default_value("R2"),
        )
        .arg(
            Arg::new("r2-threshold")
                .short('t')
                .long("r2-threshold")
                .help("Minimum r-squared value for a variant pair to be considered 'in LD'")
                .value_parser(value_parser!(f64))
                .default_value("0"),
        )
        .arg(
            Arg::new("n-ld-bins")
                .long("n-ld-bins")
                .help("Number of strata when stratifying by number of LD surrogates")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("per-ld-bin")
                .long("per-ld-bin")
                .help("Index variants per stratum when stratifying by number of LD surrogates")
                .value_parser(value_parser!(u64)),
        )
        .group(
            ArgGroup::new("ld_bins")
                .args(["n-ld-bins", "per-ld-bin"])
                .required(true),
        )
        .arg(
            Arg::new("n-maf-bins")
                .long("n-maf-bins")
                .help("Number of strata when stratifying by MAF")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("per-maf-bin")
                .long("per-maf-bin")
                .help("Index variants per stratum when stratifying by MAF")
                .value_parser(value_parser!(u64)),
        )
        .group(
            ArgGroup::new("maf_bins")
                .args(["n-maf-bins", "per-maf-bin"])
                .required(true),
        )
        .arg(
            Arg::new("max-key-size")
                .long("max-key-size")
                .help("Bound on index variant ID length (default: observed from the data)")
                .value_parser(value_parser!(usize)),
        )
}

/// Shared shape of the key-driven query subcommands: a dataset directory
/// plus keys from a file and/or inline.
fn key_query(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("dir")
                .help("Directory where the lookup table is stored")
                .required(true),
        )
        .arg(
            Arg::new("keys-file")
                .short('f')
                .long("keys-file")
                .help("File containing newline-separated index variant IDs"),
        )
        .arg(
            Arg::new("keys")
                .short('k')
                .long("keys")
                .help("Index variant IDs")
                .num_args(1..)
                .action(clap::ArgAction::Append),
        )
}

fn build_get_variants_in_ld_with() -> Command {
    key_query(
        "get_variants_in_ld_with",
        "Get variants in LD with specified key variants",
    )
}

fn build_get_variants_similar_to() -> Command {
    key_query(
        "get_variants_similar_to",
        "Get variants with MAF and number of LD surrogates similar to those of specified key variants",
    )
}

fn build_get_variants_with_stats_like() -> Command {
    Command::new("get_variants_with_stats_like")
        .about("Get variants with MAF and number of LD surrogates near specified targets")
        .arg(
            Arg::new("dir")
                .help("Directory where the lookup table is stored")
                .required(true),
        )
        .arg(
            Arg::new("target-maf")
                .short('m')
                .long("target-maf")
                .help("Target MAF value")
                .value_parser(value_parser!(f64))
                .required(true),
        )
        .arg(
            Arg::new("target-n-surrogates")
                .short('n')
                .long("target-n-surrogates")
                .help("Target number of LD surrogates")
                .value_parser(value_parser!(u64))
                .required(true),
        )
}

fn build_get_variant_statistics() -> Command {
    key_query(
        "get_variant_statistics",
        "Get MAF and number of LD surrogates of specified key variants",
    )
}

fn build_sample() -> Command {
    key_query(
        "sample",
        "Randomly sample variants similar to specified key variants",
    )
    .arg(
        Arg::new("n-samples")
            .short('n')
            .long("n-samples")
            .help("Number of samples to take for each variant")
            .value_parser(value_parser!(usize))
            .default_value("1"),
    )
}
