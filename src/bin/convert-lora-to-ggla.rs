//! convert-lora-to-ggla: turn a PEFT LoRA adapter into a GGLA file
//!
//! Usage: convert-lora-to-ggla <path> <output_path> [arch]

use lora_ggla::{convert, Architecture, ConvertError, ConvertOptions};
use log::{error, info};
use std::env;
use std::process::ExitCode;

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <path> <output_path> [arch]\n\
         Path must contain HuggingFace PEFT LoRA files 'adapter_config.json' and 'adapter_model.bin' or 'adapter_model.safetensors'\n\
         Arch must be one of {:?} (default: {})",
        Architecture::tags(),
        Architecture::default(),
    )
}

fn parse_args(args: &[String]) -> Result<ConvertOptions, ConvertError> {
    let program = args.first().map(String::as_str).unwrap_or("convert-lora-to-ggla");
    let (input, output, arch) = match args {
        [_, input, output] => (input, output, None),
        [_, input, output, arch] => (input, output, Some(arch)),
        _ => return Err(ConvertError::Usage(usage(program))),
    };
    let arch = match arch {
        Some(tag) => tag.parse::<Architecture>()?,
        None => Architecture::default(),
    };
    Ok(ConvertOptions::new(input, output).with_arch(arch))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_default();
    if matches!(args.get(1).map(String::as_str), Some("help" | "--help" | "-h")) {
        println!("{}", usage(&program));
        return ExitCode::SUCCESS;
    }

    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(ConvertError::Usage(text)) => {
            for line in text.lines() {
                info!("{line}");
            }
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Error: {e}");
            for line in usage(&program).lines() {
                info!("{line}");
            }
            return ExitCode::FAILURE;
        }
    };

    match convert(&opts) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {e}");
            if let Some(hint) = e.hint() {
                error!(" Note: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}
