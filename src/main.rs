use clap::Parser;
use owo_colors::OwoColorize;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use tmpl::cli::{generate_completions, AppConfig, Args, Commands};
use tmpl::convert::json_to_value;
use tmpl::diagnostic::render_diagnostics;
use tmpl::{Template, Value};

/// Template name used for `--text` input.
const INLINE_NAME: &str = "main";

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);
    init_logging(&config);

    if let Err(code) = run(&args, &config) {
        std::process::exit(code);
    }
}

fn init_logging(config: &AppConfig) {
    let default_level = if config.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run(args: &Args, config: &AppConfig) -> Result<(), i32> {
    let (name, source) = read_template(args).map_err(|e| error_message(config, &e))?;
    let data = read_data(args).map_err(|e| error_message(config, &e))?;
    log::debug!("read template {:?} ({} bytes)", name, source.len());

    let mut set = Template::new().with_config(config.template.clone());
    if let Err(err) = set.parse(&name, &source) {
        let rendered = render_diagnostics(&source, &name, &[err.to_diagnostic()], config.color_enabled);
        eprint!("{}", rendered);
        return Err(1);
    }

    let target = args.name.clone().unwrap_or(name.clone());
    let mut writer = open_output(args).map_err(|e| error_message(config, &e))?;
    let result = set.execute(&target, &data, &mut writer);
    // Output produced before a failure is kept.
    let flushed = writer.flush();
    if let Err(err) = result {
        let rendered = render_diagnostics(&source, &name, &[err.to_diagnostic()], config.color_enabled);
        eprint!("{}", rendered);
        return Err(1);
    }
    flushed.map_err(|e| error_message(config, &format!("Error writing output: {}", e)))?;
    Ok(())
}

fn open_output(args: &Args) -> Result<BufWriter<Box<dyn Write>>, String> {
    let sink: Box<dyn Write> = match &args.out {
        Some(path) => {
            log::debug!("writing output to {}", path.display());
            let file = File::create(path).map_err(|e| {
                format!("Error writing to output file {}: {}", path.display(), e)
            })?;
            Box::new(file)
        }
        None => Box::new(io::stdout()),
    };
    Ok(BufWriter::new(sink))
}

fn read_template(args: &Args) -> Result<(String, String), String> {
    if let Some(text) = &args.text {
        return Ok((INLINE_NAME.to_string(), text.clone()));
    }
    match &args.template_file {
        Some(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| INLINE_NAME.to_string());
            Ok((name, read_file(path)?))
        }
        None => Err("No template provided. Must provide TEMPLATE_FILE or --text".to_string()),
    }
}

fn read_data(args: &Args) -> Result<Value, String> {
    let json = if let Some(data) = &args.data {
        data.clone()
    } else if let Some(file) = &args.data_file {
        read_file(file)?
    } else if atty::is(atty::Stream::Stdin) {
        return Ok(Value::Nil);
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        buffer
    };

    if json.trim().is_empty() {
        return Ok(Value::Nil);
    }
    serde_json::from_str(&json)
        .map(json_to_value)
        .map_err(|e| format!("JSON parse error: {}", e))
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn error_message(config: &AppConfig, message: &str) -> i32 {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
    1
}
