//! Static lookup tables the matchmaker draws on when materializing a match
//! (spec §4.4 "Match creation"). In production these are loaded from the
//! static config loaders named as external collaborators in spec §1; the
//! defaults here stand in for local/dev use so the matchmaker is usable
//! without that collaborator wired up.

/// A small default BW/SC2 tournament map pool.
pub fn default_map_pool() -> Vec<String> {
    [
        "Fighting Spirit",
        "Circuit Breaker",
        "Polypoid",
        "Neo Sylphid",
        "Eternal Empire",
        "Ever Dream",
        "Goldenaura",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// Two-country → server table (spec §4.4 "Picks a server from a static
/// two-country → server table").
pub fn default_server_table() -> Vec<((String, String), String)> {
    [
        (("us", "us"), "us-east"),
        (("us", "kr"), "us-west"),
        (("kr", "kr"), "kr-seoul"),
        (("eu", "eu"), "eu-frankfurt"),
    ]
    .into_iter()
    .map(|((a, b), server)| ((a.to_owned(), b.to_owned()), server.to_owned()))
    .collect()
}

/// Looks up a server for a pair of country codes, falling back to the first
/// table entry when no specific pairing is registered.
pub fn server_for(table: &[((String, String), String)], country_a: &str, country_b: &str) -> String {
    table
        .iter()
        .find(|((a, b), _)| (a == country_a && b == country_b) || (a == country_b && b == country_a))
        .map(|(_, server)| server.clone())
        .or_else(|| table.first().map(|(_, server)| server.clone()))
        .unwrap_or_else(|| "default".to_owned())
}
