use anyhow::{bail, Context};
use bookcast::config::AudioFormat;
use bookcast::pipeline::{load_paragraphs, plan_budget, plan_paragraphs};
use bookcast::{Config, Pipeline, SizeMeasure};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::time::Instant;

fn cli() -> Command {
    Command::new("bookcast")
    .version(clap::crate_version!())
    .about("Turns PDF/EPUB ebooks into translated PDFs and narrated audiobooks")
    .subcommand_required(true)
    .arg(
        Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("JSON configuration file")
        .global(true),
    )
    .arg(
        Arg::new("verbose")
        .short('v')
        .long("verbose")
        .help("Enable debug logging")
        .action(ArgAction::SetTrue)
        .global(true),
    )
    .arg(
        Arg::new("workers")
        .short('w')
        .long("workers")
        .value_name("NUM")
        .help("Number of worker threads")
        .value_parser(clap::value_parser!(usize))
        .global(true),
    )
    .subcommand(
        Command::new("plan")
        .about("Print the chunk plan for a text or segmented JSON file")
        .arg(
            Arg::new("input")
            .short('i')
            .long("input")
            .value_name("FILE")
            .help("Plain text or *_segmented.json file")
            .required(true),
        )
        .arg(
            Arg::new("budget")
            .short('b')
            .long("budget")
            .value_name("NUM")
            .help("Maximum chunk size")
            .value_parser(clap::value_parser!(i64))
            .allow_hyphen_values(true)
            .conflicts_with("model"),
        )
        .arg(
            Arg::new("model")
            .short('m')
            .long("model")
            .value_name("NAME")
            .help("Derive the budget from a configured model"),
        )
        .arg(
            Arg::new("measure")
            .long("measure")
            .value_name("MEASURE")
            .help("How unit sizes are measured")
            .value_parser(["chars", "tokens"])
            .default_value("tokens"),
        ),
    )
    .subcommand(
        Command::new("segment").about("Convert the input book and write its segmented JSON"),
    )
    .subcommand(
        Command::new("translate")
        .about("Translate the input book and render it as PDF")
        .arg(
            Arg::new("model")
            .short('m')
            .long("model")
            .value_name("NAME")
            .help("Translation model"),
        )
        .arg(
            Arg::new("source")
            .long("source")
            .value_name("LANGUAGE")
            .help("Source language"),
        )
        .arg(
            Arg::new("target")
            .long("target")
            .value_name("LANGUAGE")
            .help("Target language"),
        ),
    )
    .subcommand(
        Command::new("estimate")
        .about("Estimate the translation cost per model")
        .arg(
            Arg::new("input")
            .short('i')
            .long("input")
            .value_name("FILE")
            .help("Text or segmented JSON file (defaults to the input book)"),
        )
        .arg(
            Arg::new("model")
            .short('m')
            .long("model")
            .value_name("NAME")
            .help("Model to price, repeatable (defaults to all configured)")
            .action(ArgAction::Append),
        ),
    )
    .subcommand(
        Command::new("audiobook")
        .about("Narrate the input book and merge it into audio parts")
        .arg(
            Arg::new("language")
            .short('l')
            .long("language")
            .value_name("CODE")
            .help("TTS voice language"),
        )
        .arg(
            Arg::new("format")
            .short('f')
            .long("format")
            .value_name("FORMAT")
            .help("Output audio format")
            .value_parser(["vorbis", "flac", "mp3", "wav"]),
        )
        .arg(
            Arg::new("quality")
            .short('q')
            .long("quality")
            .value_name("FLOAT")
            .help("Audio quality (0.0-1.0)")
            .value_parser(clap::value_parser!(f32)),
        )
        .arg(
            Arg::new("speed")
            .short('s')
            .long("speed")
            .value_name("FLOAT")
            .help("Voice speed multiplier")
            .value_parser(clap::value_parser!(f32)),
        )
        .arg(
            Arg::new("target-minutes")
            .short('t')
            .long("target-minutes")
            .value_name("MINUTES")
            .help("Length of each merged part")
            .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("skip-lines")
            .long("skip-lines")
            .value_name("NUM")
            .help("Leading lines to leave out of the narration")
            .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("keep-intermediate")
            .long("keep-intermediate")
            .help("Keep chunk WAVs and the extracted text")
            .action(ArgAction::SetTrue),
        ),
    )
    .subcommand(Command::new("durations").about("Report the duration of merged audio parts"))
    .subcommand(
        Command::new("init-config")
        .about("Write the default configuration")
        .arg(Arg::new("output").value_name("FILE").default_value("bookcast.json")),
    )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("failed to load config {}", path))?,
        None => Config::default(),
    };
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.max_workers = *workers;
    }
    Ok(config)
}

fn apply_translate_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(model) = matches.get_one::<String>("model") {
        config.translation.model = model.clone();
    }
    if let Some(source) = matches.get_one::<String>("source") {
        config.translation.source_language = source.clone();
    }
    if let Some(target) = matches.get_one::<String>("target") {
        config.translation.target_language = target.clone();
    }
}

fn apply_audiobook_overrides(config: &mut Config, matches: &ArgMatches) {
    let speech = &mut config.speech;
    if let Some(language) = matches.get_one::<String>("language") {
        speech.language = language.clone();
    }
    if let Some(format) = matches
        .get_one::<String>("format")
        .and_then(|f| AudioFormat::parse(f))
    {
        speech.output_format = format;
    }
    if let Some(quality) = matches.get_one::<f32>("quality") {
        speech.quality = *quality;
    }
    if let Some(speed) = matches.get_one::<f32>("speed") {
        speech.voice_speed = *speed;
    }
    if let Some(minutes) = matches.get_one::<f64>("target-minutes") {
        speech.target_minutes = *minutes;
    }
    if let Some(lines) = matches.get_one::<usize>("skip-lines") {
        speech.skip_lines = *lines;
    }
}

fn run_plan(config: &Config, matches: &ArgMatches) -> anyhow::Result<()> {
    let input = PathBuf::from(
        matches
            .get_one::<String>("input")
            .map(String::as_str)
            .unwrap_or_default(),
    );
    let measure: SizeMeasure = matches
        .get_one::<String>("measure")
        .map(String::as_str)
        .unwrap_or("tokens")
        .parse()?;

    let budget = plan_budget(
        config,
        matches.get_one::<i64>("budget").copied(),
        matches.get_one::<String>("model").map(String::as_str),
        measure,
    )?;

    let paragraphs = load_paragraphs(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let report = plan_paragraphs(&paragraphs, budget, measure);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_estimate(pipeline: &Pipeline, matches: &ArgMatches) -> anyhow::Result<()> {
    let paragraphs = match matches.get_one::<String>("input") {
        Some(input) => load_paragraphs(Path::new(input))
            .with_context(|| format!("failed to read {}", input))?,
        None => pipeline.segment()?.paragraphs,
    };
    let models: Vec<String> = matches
        .get_many::<String>("model")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let estimates = pipeline.estimate(&paragraphs, &models)?;
    println!(
        "{:<20} {:>6} {:>8} {:>12} {:>12} {:>12} {:>10}",
        "model", "chunks", "prompt", "input", "output", "thinking", "cost USD"
    );
    for e in &estimates {
        println!(
            "{:<20} {:>6} {:>8} {:>12} {:>12} {:>12} {:>10.4}",
            e.model,
            e.chunks,
            e.prompt_tokens,
            e.input_tokens,
            e.output_tokens,
            e.thinking_tokens,
            e.cost.total_cost
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = load_config(&matches)?;
    let (command, sub) = match matches.subcommand() {
        Some(pair) => pair,
        None => bail!("no command given"),
    };

    match command {
        "translate" => apply_translate_overrides(&mut config, sub),
        "audiobook" => apply_audiobook_overrides(&mut config, sub),
        _ => {}
    }
    config.validate()?;

    rayon::ThreadPoolBuilder::new()
    .num_threads(config.max_workers)
    .build_global()?;

    let start_time = Instant::now();
    match command {
        "plan" => return run_plan(&config, sub),
        "init-config" => {
            let output = sub
                .get_one::<String>("output")
                .map(String::as_str)
                .unwrap_or("bookcast.json");
            config.save(Path::new(output))?;
            println!("📝 Default configuration written to {}", output);
            return Ok(());
        }
        _ => {}
    }

    let pipeline = Pipeline::new(config)?;
    match command {
        "segment" => {
            let book = pipeline.segment()?;
            println!("✅ {} paragraphs", book.paragraphs.len());
            println!("📁 Segmented text saved to: {}", book.json_path.display());
        }
        "translate" => {
            println!("🔄 Translating with {}...", pipeline.config().translation.model);
            let report = pipeline.translate()?;
            println!("✅ {} chunks translated", report.chunks - report.failed.len());
            if !report.failed.is_empty() {
                println!("⚠️  Failed chunks: {}", report.failed.join(", "));
            }
            println!(
                "📊 Tokens: input {}, output {}, thinking {}",
                report.usage.input_tokens, report.usage.output_tokens, report.usage.thinking_tokens
            );
            println!("📁 Translation saved to: {}", report.text_path.display());
            println!("📁 PDF saved to: {}", report.pdf_path.display());
        }
        "estimate" => run_estimate(&pipeline, sub)?,
        "audiobook" => {
            println!("🎤 Converting book to audio...");
            let report = pipeline.audiobook(sub.get_flag("keep-intermediate"))?;
            println!(
                "✅ {} chunks merged into {} parts ({:.1} minutes)",
                report.chunks,
                report.parts.len(),
                report.total_minutes
            );
            if let Some(playlist) = &report.playlist {
                println!("📝 Playlist: {}", playlist.display());
            }
        }
        "durations" => {
            let report = pipeline.durations()?;
            for entry in &report.entries {
                println!("{}: {:.2} minutes ({:.2} MB)", entry.file, entry.minutes, entry.size_mb);
            }
            println!(
                "📊 {} parts, total {:.2} minutes, average {:.2} minutes",
                report.entries.len(),
                report.total_minutes,
                report.average_minutes()
            );
        }
        other => bail!("unknown command {}", other),
    }

    println!("✅ Completed in {:.2?}", start_time.elapsed());
    Ok(())
}
