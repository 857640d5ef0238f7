use anyhow::{Context as _, Result as AResult};
use tokio::io::{AsyncBufReadExt as _, BufReader, stdin};
use tracing::{error, info, warn};

use super::{Operator, OperatorCommand};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleExit {
	Quit,
	InputClosed,
}

/// Reads operator commands from stdin until `quit` or end of input.
pub async fn run(operator: &mut Operator) -> AResult<ConsoleExit> {
	let mut lines = BufReader::new(stdin()).lines();
	info!("Operator console ready, type `help` for commands");
	while let Some(line) = lines
		.next_line()
		.await
		.context("Failed to read operator input")?
	{
		if line.trim().is_empty() {
			continue;
		}
		let command = match line.parse::<OperatorCommand>() {
			Ok(command) => command,
			Err(err) => {
				warn!("{err}");
				continue;
			}
		};
		let quit = command == OperatorCommand::Quit;
		match operator.apply(command).await {
			Ok(reply) => info!("{reply}"),
			Err(err) => error!("{err:#}"),
		}
		if quit {
			return Ok(ConsoleExit::Quit);
		}
	}
	Ok(ConsoleExit::InputClosed)
}
