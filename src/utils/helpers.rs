/// Splits `text` into chunks of at most `limit` bytes, breaking after a newline
/// where one is available and never inside a character.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<&str> {
	let mut chunks = Vec::new();
	let mut rest = text;
	while rest.len() > limit {
		let mut end = limit;
		while !rest.is_char_boundary(end) {
			end = end.saturating_sub(1);
		}
		let head = rest.get(..end).unwrap_or(rest);
		let cut = head.rfind('\n').filter(|&pos| pos > 0).map_or(end, |pos| pos.saturating_add(1));
		let cut = if cut == 0 {
			rest.chars().next().map_or(rest.len(), char::len_utf8)
		} else {
			cut
		};
		let (chunk, tail) = rest.split_at(cut);
		if !chunk.trim().is_empty() {
			chunks.push(chunk);
		}
		rest = tail;
	}
	if !rest.trim().is_empty() {
		chunks.push(rest);
	}
	chunks
}
