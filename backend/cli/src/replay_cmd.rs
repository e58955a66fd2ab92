//! `slashforge replay`: dispatch recorded interactions concurrently.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use slashforge_commands::{AutocompleteOutcome, DispatchOutcome, DispatchState, InteractionOutcome};
use slashforge_config::SlashForgeConfig;
use slashforge_core::Interaction;
use tracing::info;

use crate::console::ConsoleSink;
use crate::demo;
use crate::terminal_output::{Column, GREEN, RED, YELLOW, note_error, note_info, paint, render_table};

/// Parse NDJSON interactions. Blank lines and `#` comments are skipped.
pub fn parse(input: &str) -> Result<Vec<Interaction>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid interaction on line {}", index + 1))
        })
        .collect()
}

pub async fn run(config: &SlashForgeConfig, file: &Path) -> Result<()> {
    let input = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let interactions = parse(&input)?;
    note_info(&format!("Replaying {} interactions from {}", interactions.len(), file.display()));

    let dispatcher = demo::dispatcher(config, Arc::new(ConsoleSink)).await?;
    let mut handles = Vec::with_capacity(interactions.len());
    for interaction in interactions {
        let label = interaction.command().to_string();
        handles.push((label, dispatcher.spawn(interaction)?));
    }

    let (labels, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
    let results = join_all(handles).await;

    dispatcher.shutdown();
    dispatcher.bus().shutdown().await;

    let mut rows = Vec::with_capacity(results.len());
    for (label, result) in labels.into_iter().zip(results) {
        match result {
            Ok(outcome) => rows.push(row(&label, &outcome)),
            Err(err) => note_error(&format!("/{label} task failed: {err}")),
        }
    }
    println!();
    print!(
        "{}",
        render_table(
            &[
                Column::left("Interaction"),
                Column::left("Command"),
                Column::left("State"),
                Column::left("Error"),
                Column::right("ms"),
            ],
            &rows,
        )
    );
    info!(interactions = rows.len(), "Replay finished");
    Ok(())
}

fn row(label: &str, outcome: &InteractionOutcome) -> Vec<String> {
    match outcome {
        InteractionOutcome::Command(outcome) => command_row(outcome),
        InteractionOutcome::Autocomplete(outcome) => vec![
            "autocomplete".to_string(),
            format!("/{label}"),
            autocomplete_label(outcome),
            String::new(),
            String::new(),
        ],
    }
}

fn command_row(outcome: &DispatchOutcome) -> Vec<String> {
    let state = format!("{:?}", outcome.state);
    let state = match (outcome.state, outcome.error) {
        (DispatchState::Acked, None) => paint(&state, GREEN),
        (_, None) => paint(&state, YELLOW),
        (_, Some(_)) => paint(&state, RED),
    };
    vec![
        "command".to_string(),
        format!("/{}", outcome.command),
        state,
        outcome.error.map(|kind| kind.to_string()).unwrap_or_default(),
        outcome.elapsed_ms.to_string(),
    ]
}

fn autocomplete_label(outcome: &AutocompleteOutcome) -> String {
    match outcome {
        AutocompleteOutcome::Suggested { count, truncated: false } => paint(&format!("{count} suggestions"), GREEN),
        AutocompleteOutcome::Suggested { count, truncated: true } => {
            paint(&format!("{count} suggestions (truncated)"), YELLOW)
        }
        AutocompleteOutcome::NoHandler => paint("no handler", YELLOW),
        AutocompleteOutcome::Unresolved => paint("unresolved", YELLOW),
        AutocompleteOutcome::Failed => paint("failed", RED),
        AutocompleteOutcome::TimedOut => paint("timed out", RED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slashforge_commands::testing::RecordingSink;

    const SAMPLE: &str = r#"
# math
{"type":"command","token":"t-1","command":"math add","invoker":{"user_id":"1","guild_id":"500"},"options":[{"name":"a","value":2},{"name":"b","value":40}]}
{"type":"autocomplete","token":"t-2","command":"tag","invoker":{"user_id":1},"options":[{"name":"name","value":"rus","focused":true}]}
"#;

    #[test]
    fn parses_ndjson_skipping_comments() {
        let interactions = parse(SAMPLE).unwrap();
        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[0].command(), "math add");
        assert!(matches!(interactions[1], Interaction::Autocomplete(_)));
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse("\n{\"type\":\"command\"}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn replays_against_demo_tree() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = demo::dispatcher(&SlashForgeConfig::default(), sink.clone()).await.unwrap();
        let handles: Vec<_> = parse(SAMPLE)
            .unwrap()
            .into_iter()
            .map(|i| dispatcher.spawn(i).unwrap())
            .collect();
        let outcomes: Vec<InteractionOutcome> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

        assert!(matches!(
            &outcomes[0],
            InteractionOutcome::Command(o) if o.state == DispatchState::Acked && o.error.is_none()
        ));
        assert_eq!(
            outcomes[1],
            InteractionOutcome::Autocomplete(AutocompleteOutcome::Suggested { count: 2, truncated: false })
        );
        assert_eq!(sink.messages(), vec!["42"]);
    }
}
