//! Check command - validates a document without saving it.

use docmap::validation::FieldErrors;
use serde_json::json;

use crate::cli::CheckArgs;
use crate::commands::open;
use crate::output::{OutputFormat, print_value};

const WHOLE_DOCUMENT: &str = "<document>";

/// One line per problem under a FIELD/PROBLEM heading, with the field
/// column padded to its widest entry.
fn render_problems(field_errors: &FieldErrors) -> String {
    let problems: Vec<(&str, &str)> = field_errors
        .iter()
        .flat_map(|(path, messages)| {
            let field = if path.is_empty() { WHOLE_DOCUMENT } else { path.as_str() };
            messages.iter().map(move |message| (field, message.as_str()))
        })
        .collect();

    let width = problems
        .iter()
        .map(|(field, _)| field.len())
        .fold("FIELD".len(), usize::max);

    std::iter::once(("FIELD", "PROBLEM"))
        .chain(problems)
        .map(|(field, problem)| format!("{field:<width$}  {problem}\n"))
        .collect()
}

/// Run the check command. Fails when the document is invalid.
pub fn run(args: &CheckArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let target = open(&args.target)?;

    let err = match target.document.validate_or_throw() {
        Ok(()) => {
            match format {
                OutputFormat::Human => println!("OK"),
                OutputFormat::Json => print_value(&json!({"valid": true}), format)?,
            }
            return Ok(());
        }
        Err(err) => err,
    };

    let Some(field_errors) = err.validation_errors() else {
        return Err(err.into());
    };

    match format {
        OutputFormat::Human => print!("{}", render_problems(field_errors)),
        OutputFormat::Json => {
            print_value(&json!({"valid": false, "errors": field_errors}), format)?;
        }
    }

    Err(err.into())
}
