use anyhow::{Context as _, Result as AResult};
use poise::{
	FrameworkContext, FrameworkError,
	serenity_prelude::{ChannelId, ChannelType, Context as SContext, FullEvent, Message},
};
use tracing::{error, warn};

use super::{
	ChannelKey, InboundMessage, MessageKey, PlatformEvent,
	discord::{Data, Error},
};

pub async fn on_error(error: FrameworkError<'_, Data, Error>) {
	match error {
		FrameworkError::Command { error, ctx, .. } => {
			error!("Error in command `{}`: {:?}", ctx.command().name, error);
		}
		FrameworkError::Setup { error, .. } => {
			error!("Error during Discord setup: {:?}", error);
		}
		error => {
			if let Err(e) = poise::builtins::on_error(error).await {
				error!("Error while handling error: {e}");
			}
		}
	}
}

pub async fn event_handler(
	ctx: &SContext,
	event: &FullEvent,
	_framework: FrameworkContext<'_, Data, Error>,
	data: &Data,
) -> Result<(), Error> {
	match event {
		FullEvent::Message { new_message } => {
			if let Err(error) = handle_message(ctx, data, new_message).await {
				warn!("Error handling sent message: {error}");
			}
		}
		FullEvent::ChannelUpdate { new, .. } => {
			data.channel_names.remove(&new.id.get());
		}
		_ => {}
	}
	Ok(())
}

async fn handle_message(ctx: &SContext, data: &Data, message: &Message) -> AResult<()> {
	if message.guild_id.is_none() {
		return Ok(());
	}
	let Some(channel_name) = channel_name(ctx, data, message.channel_id).await? else {
		return Ok(());
	};
	let inbound = InboundMessage {
		id: MessageKey(message.id.get()),
		channel: ChannelKey(message.channel_id.get()),
		channel_name,
		author: message.author.display_name().to_owned(),
		from_self: message.author.id == ctx.cache.current_user().id,
		from_bot: message.author.bot,
		content: message.content_safe(&ctx.cache),
	};
	data.events
		.send(PlatformEvent::Message(inbound))
		.context("Session is no longer listening")?;
	Ok(())
}

async fn channel_name(
	ctx: &SContext,
	data: &Data,
	channel_id: ChannelId,
) -> AResult<Option<String>> {
	if let Some(name) = data.channel_names.get(&channel_id.get()) {
		return Ok(name.value().clone());
	}
	let name = channel_id
		.to_channel(ctx)
		.await
		.context("Failed to look up message channel")?
		.guild()
		.filter(|channel| channel.kind == ChannelType::Text)
		.map(|channel| channel.name);
	data.channel_names.insert(channel_id.get(), name.clone());
	Ok(name)
}
