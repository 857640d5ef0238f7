use std::collections::BTreeSet;

use tracing::warn;

/// Decides which channels the bot participates in, by channel name.
#[derive(Clone, Debug, Default)]
pub struct ChannelFilter {
	starting_channel: Option<String>,
	whitelist: BTreeSet<String>,
	blacklist: BTreeSet<String>,
}

impl ChannelFilter {
	#[must_use]
	pub fn new(
		starting_channel: Option<String>,
		whitelist: BTreeSet<String>,
		blacklist: BTreeSet<String>,
	) -> Self {
		if !whitelist.is_empty() && !blacklist.is_empty() {
			warn!("Both a channel whitelist and a blacklist are set; only the whitelist is consulted");
		}
		Self {
			starting_channel,
			whitelist,
			blacklist,
		}
	}

	/// The starting channel always passes. Otherwise a non-empty whitelist admits only its
	/// members, and with no whitelist a non-empty blacklist admits everything else.
	#[must_use]
	pub fn allows(&self, channel: &str) -> bool {
		if self.starting_channel.as_deref() == Some(channel) {
			return true;
		}
		if !self.whitelist.is_empty() {
			return self.whitelist.contains(channel);
		}
		!self.blacklist.is_empty() && !self.blacklist.contains(channel)
	}

	/// Whether naming the character in `channel` may open it up. A non-empty whitelist
	/// still limits this to its members, and blacklisted channels stay closed.
	#[must_use]
	pub fn admits_mention(&self, channel: &str) -> bool {
		if !self.whitelist.is_empty() {
			return self.whitelist.contains(channel);
		}
		!self.blacklist.contains(channel)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::types::parse_channel_list;

	#[test]
	fn whitelist_drops_other_channels() {
		let filter = ChannelFilter::new(None, parse_channel_list("general"), BTreeSet::new());
		assert!(filter.allows("general"));
		assert!(!filter.allows("random"));
	}

	#[test]
	fn blacklist_drops_listed_channels() {
		let filter = ChannelFilter::new(None, BTreeSet::new(), parse_channel_list("spam"));
		assert!(!filter.allows("spam"));
		assert!(filter.allows("general"));
	}

	#[test]
	fn starting_channel_always_passes() {
		let filter = ChannelFilter::new(
			Some("spam".to_owned()),
			parse_channel_list("general"),
			parse_channel_list("spam"),
		);
		assert!(filter.allows("spam"));
		assert!(filter.allows("general"));
		assert!(!filter.allows("random"));
	}

	#[test]
	fn no_lists_means_starting_channel_only() {
		let filter = ChannelFilter::new(Some("lobby".to_owned()), BTreeSet::new(), BTreeSet::new());
		assert!(filter.allows("lobby"));
		assert!(!filter.allows("general"));
		assert!(!ChannelFilter::default().allows("general"));
	}

	#[test]
	fn mentions_respect_both_lists() {
		assert!(ChannelFilter::default().admits_mention("general"));
		let blacklisted = ChannelFilter::new(None, BTreeSet::new(), parse_channel_list("spam"));
		assert!(!blacklisted.admits_mention("spam"));
		assert!(blacklisted.admits_mention("general"));
		let whitelisted = ChannelFilter::new(None, parse_channel_list("general"), BTreeSet::new());
		assert!(whitelisted.admits_mention("general"));
		assert!(!whitelisted.admits_mention("random"));
	}
}
