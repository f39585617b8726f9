use std::slice;

/// Path parameters captured while matching, in capture order.
///
/// Unnamed captures (such as a bare `*` wildcard) are stored under positional keys `"0"`,
/// `"1"`, and so on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
	entries: Vec<(String, String)>,
}

impl Params {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.entries
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	/// Sets `name` to `value`, keeping the original position if the name was already present.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		let value = value.into();
		match self.entries.iter_mut().find(|(key, _)| *key == name) {
			Some(entry) => entry.1 = value,
			None => self.entries.push((name, value)),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> Iter<'_> {
		Iter {
			inner: self.entries.iter(),
		}
	}

	/// Combines these (parent) params with a child's captures.
	///
	/// Named child captures win on collision. When both sides carry positional captures, the
	/// child's are renumbered to follow the parent's instead of overwriting them.
	pub fn merged(&self, child: Params) -> Params {
		let mut merged = self.clone();
		let offset = if self.contains("0") && child.contains("0") {
			self.positional_len()
		} else {
			0
		};

		for (name, value) in child.entries {
			match name.parse::<usize>() {
				Ok(index) if offset > 0 => merged.insert((index + offset).to_string(), value),
				_ => merged.insert(name, value),
			}
		}

		merged
	}

	fn positional_len(&self) -> usize {
		(0..)
			.take_while(|index: &usize| self.contains(&index.to_string()))
			.count()
	}
}

impl<K, V> FromIterator<(K, V)> for Params
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut params = Params::new();
		for (name, value) in iter {
			params.insert(name, value);
		}
		params
	}
}

impl<'a> IntoIterator for &'a Params {
	type Item = (&'a str, &'a str);
	type IntoIter = Iter<'a>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

#[derive(Debug)]
pub struct Iter<'a> {
	inner: slice::Iter<'a, (String, String)>,
}

impl<'a> Iterator for Iter<'a> {
	type Item = (&'a str, &'a str);

	fn next(&mut self) -> Option<Self::Item> {
		self.inner
			.next()
			.map(|(name, value)| (name.as_str(), value.as_str()))
	}
}

#[cfg(test)]
mod test {
	use super::Params;

	#[test]
	fn insert_keeps_position() {
		let mut params = Params::new();
		params.insert("a", "1");
		params.insert("b", "2");
		params.insert("a", "3");

		let collected: Vec<_> = params.iter().collect();
		assert_eq!(collected, vec![("a", "3"), ("b", "2")]);
	}

	#[test]
	fn child_wins_on_collision() {
		let parent: Params = vec![("id", "parent"), ("org", "acme")].into_iter().collect();
		let child: Params = vec![("id", "child")].into_iter().collect();

		let merged = parent.merged(child);
		assert_eq!(merged.get("id"), Some("child"));
		assert_eq!(merged.get("org"), Some("acme"));
	}

	#[test]
	fn positional_captures_are_renumbered() {
		let parent: Params = vec![("0", "a/b"), ("1", "c")].into_iter().collect();
		let child: Params = vec![("0", "d"), ("name", "e")].into_iter().collect();

		let merged = parent.merged(child);
		assert_eq!(merged.get("0"), Some("a/b"));
		assert_eq!(merged.get("1"), Some("c"));
		assert_eq!(merged.get("2"), Some("d"));
		assert_eq!(merged.get("name"), Some("e"));
	}

	#[test]
	fn positional_child_without_positional_parent_is_kept() {
		let parent: Params = vec![("id", "7")].into_iter().collect();
		let child: Params = vec![("0", "rest")].into_iter().collect();

		let merged = parent.merged(child);
		assert_eq!(merged.get("0"), Some("rest"));
		assert_eq!(merged.get("id"), Some("7"));
	}
}
