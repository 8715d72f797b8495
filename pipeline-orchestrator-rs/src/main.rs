// meridian-chat: interactive front end for the pipeline controller.
// One session per process; type 'quit' to exit, '/stats' for counters.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use pipeline_orchestrator::collaborators::{
    AdaptiveCommunication, HeuristicNlu, InMemoryMemory, StaticThreatIntel,
};
use pipeline_orchestrator::PipelineController;
use pipeline_types::{KnowledgeItem, PipelineConfig};

const TURN_LIMIT: Duration = Duration::from_secs(30);

fn seed_knowledge(memory: &InMemoryMemory) {
    memory.add_knowledge(KnowledgeItem {
        title: "Assistant capabilities".to_string(),
        content: "This assistant answers questions, walks through technical problems, and \
                  gives security guidance."
            .to_string(),
        source: "builtin".to_string(),
    });
    memory.add_security_knowledge(KnowledgeItem {
        title: "Phishing basics".to_string(),
        content: "Phishing messages pressure you to act fast. Verify the sender through a \
                  separate channel before clicking anything."
            .to_string(),
        source: "builtin".to_string(),
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = PipelineConfig::from_env();
    let clarification_threshold = config.clarification_threshold;

    let memory = Arc::new(InMemoryMemory::new());
    seed_knowledge(&memory);

    let advisories = vec![KnowledgeItem {
        title: "Current advisory".to_string(),
        content: "Keep systems patched and review authentication logs for unusual access."
            .to_string(),
        source: "threat-feed".to_string(),
    }];

    let controller = PipelineController::new(
        config,
        Arc::new(HeuristicNlu::new()),
        memory,
        Some(Arc::new(StaticThreatIntel::new(advisories))),
        Arc::new(AdaptiveCommunication::new(clarification_threshold)),
    )?;

    let session_id = uuid::Uuid::new_v4().to_string();
    println!("Meridian assistant ready. Type 'quit' to exit, '/stats' for counters.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query == "/stats" {
            println!("{}", serde_json::to_string_pretty(&controller.stats())?);
            continue;
        }

        let outcome = controller
            .handle_turn_with_timeout(&session_id, query, TURN_LIMIT)
            .await;
        println!("{}", outcome.response);
    }

    Ok(())
}
