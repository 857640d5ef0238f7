use anyhow::Context as _;
use poise::CreateReply;

use super::{
	ChannelKey, PlatformEvent,
	discord::{Context, Error},
};

/// Forget this channel's conversation and start over
#[poise::command(slash_command, guild_only)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
	let Some(channel) = ctx.guild_channel().await else {
		ctx.say("This only works in server channels").await?;
		return Ok(());
	};
	ctx.data()
		.events
		.send(PlatformEvent::Reset {
			channel: ChannelKey(channel.id.get()),
			channel_name: channel.name,
		})
		.context("Bot is shutting down")?;
	ctx.send(
		CreateReply::default()
			.content("Conversation reset")
			.ephemeral(true),
	)
	.await?;
	Ok(())
}

/// Make the bot say something
#[poise::command(slash_command)]
pub async fn repeat(
	ctx: Context<'_>,
	#[description = "What to repeat"] message: String,
) -> Result<(), Error> {
	ctx.say(message).await?;
	Ok(())
}
