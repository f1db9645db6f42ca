//! Property tests for argument parsing and output

use clap::Parser;
use proptest::prelude::*;

use nitella_crypto::wordlist::{parse_pairing_code, PAIRING_WORDS};

use crate::cli::{CodeAction, CodeArgs, Commands};
use crate::output::{CodeOutput, OutputFormat, OutputFormatter};
use crate::Cli;

fn pairing_code() -> impl Strategy<Value = String> {
    (
        1u8..=9,
        0..PAIRING_WORDS.len(),
        0..PAIRING_WORDS.len(),
    )
        .prop_map(|(n, a, b)| format!("{n}-{}-{}", PAIRING_WORDS[a], PAIRING_WORDS[b]))
}

proptest! {
    #[test]
    fn prop_code_check_parses_any_code(code in pairing_code()) {
        let cli = Cli::try_parse_from(["nitella", "code", "check", code.as_str()]).unwrap();
        match cli.command {
            Commands::Code(CodeArgs { action: CodeAction::Check { code: parsed } }) => {
                prop_assert_eq!(&parsed, &code);
                prop_assert_eq!(parse_pairing_code(&parsed).unwrap(), code);
            }
            _ => prop_assert!(false, "wrong command"),
        }
    }

    #[test]
    fn prop_output_format_case_insensitive(idx in 0usize..3, upper in any::<bool>()) {
        let name = ["table", "json", "quiet"][idx];
        let input = if upper { name.to_uppercase() } else { name.to_string() };
        let format: OutputFormat = input.parse().unwrap();
        prop_assert_eq!(format.to_string(), name);
    }

    #[test]
    fn prop_code_json_round_trips(code in pairing_code()) {
        let formatter = OutputFormatter::new(OutputFormat::Json, false);
        let out = formatter.format_code(&CodeOutput { code: code.clone(), valid: true }, "code check");
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        prop_assert_eq!(value["data"]["code"].as_str(), Some(code.as_str()));
        prop_assert_eq!(value["command"].as_str(), Some("code check"));
    }
}
