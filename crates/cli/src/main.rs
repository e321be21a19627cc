//! ldlookup CLI — build and query on-disk LD lookup tables.
//!
//! `setup` ingests a delimited LD data file into a new dataset directory;
//! the five query subcommands open an existing dataset and print
//! tab-separated results to stdout. Exit code 0 on success, 1 on failure
//! with the error on stderr.

mod commands;

use std::path::{Path, PathBuf};
use std::process;

use clap::ArgMatches;

use ldlookup_core::Result;
use ldlookup_engine::{
    build, for_each_key, Binning, BuildConfig, ColumnSpec, ParserConfig, Reader,
};

use commands::build_cli;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    if let Err(e) = run(&matches) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("setup", sub)) => run_setup(sub),
        Some(("get_variants_in_ld_with", sub)) => run_variants_in_ld_with(sub),
        Some(("get_variants_similar_to", sub)) => run_variants_similar_to(sub),
        Some(("get_variants_with_stats_like", sub)) => run_variants_with_stats_like(sub),
        Some(("get_variant_statistics", sub)) => run_variant_statistics(sub),
        Some(("sample", sub)) => run_sample(sub),
        _ => unreachable!("subcommand is required"),
    }
}

fn run_setup(matches: &ArgMatches) -> Result<()> {
    let ld_binning = match matches.get_one::<u64>("n-ld-bins") {
        Some(&n) => Binning::Bins(n),
        None => Binning::PerBin(*matches.get_one::<u64>("per-ld-bin").expect("arg group")),
    };
    let maf_binning = match matches.get_one::<u64>("n-maf-bins") {
        Some(&n) => Binning::Bins(n),
        None => Binning::PerBin(*matches.get_one::<u64>("per-maf-bin").expect("arg group")),
    };

    let config = BuildConfig {
        source: PathBuf::from(arg_str(matches, "src")),
        dataset_dir: PathBuf::from(arg_str(matches, "dir")),
        parser: ParserConfig {
            delimiter: *matches.get_one::<char>("delimiter").expect("default"),
            index_id: ColumnSpec::from_arg(arg_str(matches, "index-id-column")),
            ld_id: ColumnSpec::from_arg(arg_str(matches, "ld-id-column")),
            index_maf: ColumnSpec::from_arg(arg_str(matches, "index-maf-column")),
            r2: ColumnSpec::from_arg(arg_str(matches, "r2-column")),
            r2_threshold: *matches.get_one::<f64>("r2-threshold").expect("default"),
        },
        ld_binning,
        maf_binning,
        max_variant_id_len: matches.get_one::<usize>("max-key-size").copied(),
    };

    let report = build(&config)?;
    eprintln!(
        "Built {}: {} index variants, {} pairs in LD, {} invalid lines skipped",
        config.dataset_dir.display(),
        report.n_index_variants,
        report.n_pairs_in_ld,
        report.n_invalid_lines
    );
    Ok(())
}

fn run_variants_in_ld_with(matches: &ArgMatches) -> Result<()> {
    let mut reader = open_reader(matches)?;
    println!("Variant ID\tVariant ID of LD Surrogate");
    each_key(matches, |key| {
        for surrogate in reader.variants_in_ld_with(key)? {
            println!("{}\t{}", key, surrogate);
        }
        Ok(())
    })
}

fn run_variants_similar_to(matches: &ArgMatches) -> Result<()> {
    let mut reader = open_reader(matches)?;
    println!("Variant ID\tVariant ID of Similar Variant");
    each_key(matches, |key| {
        for similar in reader.variants_similar_to(key)? {
            println!("{}\t{}", key, similar);
        }
        Ok(())
    })
}

fn run_variants_with_stats_like(matches: &ArgMatches) -> Result<()> {
    let mut reader = Reader::open(Path::new(arg_str(matches, "dir")))?;
    let target_maf = *matches.get_one::<f64>("target-maf").expect("required");
    let target_n = *matches.get_one::<u64>("target-n-surrogates").expect("required");

    println!("Target MAF\tTarget # LD Surrogates\tVariant ID");
    for variant in reader.variants_with_stats_like(target_maf, target_n)? {
        println!("{}\t{}\t{}", target_maf, target_n, variant);
    }
    Ok(())
}

fn run_variant_statistics(matches: &ArgMatches) -> Result<()> {
    let mut reader = open_reader(matches)?;
    println!("Variant ID\t# LD Surrogates\tMAF");
    each_key(matches, |key| {
        let stats = reader.variant_stats(key)?;
        println!("{}\t{}\t{}", key, stats.n_surrogates, stats.maf);
        Ok(())
    })
}

fn run_sample(matches: &ArgMatches) -> Result<()> {
    let mut reader = open_reader(matches)?;
    let n_samples = *matches.get_one::<usize>("n-samples").expect("default");
    println!("Sample #\tVariant ID\tVariant ID of Similar Variant");
    each_key(matches, |key| {
        for (i, sampled) in reader.sample_similar(key, n_samples)?.iter().enumerate() {
            println!("{}\t{}\t{}", i + 1, key, sampled);
        }
        Ok(())
    })
}

fn open_reader(matches: &ArgMatches) -> Result<Reader> {
    Reader::open(Path::new(arg_str(matches, "dir")))
}

fn each_key<F>(matches: &ArgMatches, f: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let keys_file = matches.get_one::<String>("keys-file").map(PathBuf::from);
    let inline_keys: Vec<String> = matches
        .get_many::<String>("keys")
        .map(|keys| keys.cloned().collect())
        .unwrap_or_default();
    for_each_key(keys_file.as_deref(), &inline_keys, f)
}

fn arg_str<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.get_one::<String>(name).expect("required arg")
}
