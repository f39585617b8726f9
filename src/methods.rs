/// Calls `$callback!` with every recognized HTTP method as `ident => "name"` pairs.
///
/// The list mirrors the methods Node's HTTP parser recognizes. `M-SEARCH` becomes `m_search`
/// and `MOVE` becomes the raw identifier `r#move`.
macro_rules! for_each_method {
	($callback:ident) => {
		$callback! {
			acl => "acl",
			bind => "bind",
			checkout => "checkout",
			connect => "connect",
			copy => "copy",
			delete => "delete",
			get => "get",
			head => "head",
			link => "link",
			lock => "lock",
			m_search => "m-search",
			merge => "merge",
			mkactivity => "mkactivity",
			mkcalendar => "mkcalendar",
			mkcol => "mkcol",
			r#move => "move",
			notify => "notify",
			options => "options",
			patch => "patch",
			post => "post",
			propfind => "propfind",
			proppatch => "proppatch",
			purge => "purge",
			put => "put",
			query => "query",
			rebind => "rebind",
			report => "report",
			search => "search",
			source => "source",
			subscribe => "subscribe",
			trace => "trace",
			unbind => "unbind",
			unlink => "unlink",
			unlock => "unlock",
			unsubscribe => "unsubscribe",
		}
	};
}

macro_rules! method_names {
	($($name:ident => $method:literal),* $(,)?) => {
		/// Lower-case names of every method with a dedicated registration function.
		pub const METHODS: &[&str] = &[$($method),*];
	};
}

for_each_method!(method_names);
