//! Show command - prints a document or one of its attributes.

use serde_json::json;

use crate::cli::ShowArgs;
use crate::commands::open;
use crate::output::{OutputFormat, print_value};

/// Run the show command
pub fn run(args: &ShowArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let target = open(&args.target)?;
    let doc = &target.document;

    let value = match &args.get {
        Some(name) => doc.get(name)?.to_value(),
        None => doc.to_value(),
    };

    match format {
        OutputFormat::Human => {
            println!("Type:     {}", doc.type_name());
            println!("Source:   {}", target.root.path().display());
            println!("Exists:   {}", doc.exists());
            print_value(&value, format)?;
        }
        OutputFormat::Json => {
            let report = json!({
                "type": doc.type_name(),
                "exists": doc.exists(),
                "value": value,
            });
            print_value(&report, format)?;
        }
    }

    Ok(())
}
