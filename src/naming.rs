use serde::Deserialize;

/// How a show numbers its episodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Numbering {
    /// `S01E02`
    #[default]
    Standard,
    /// `002`, used by anime releases
    Absolute,
}

/// Episode tag for search strings and file names.
///
/// Standard numbering needs both a season and an episode. Absolute numbering
/// applies when exactly one of them is set.
pub fn episode_num(season: Option<u32>, episode: Option<u32>, numbering: Numbering) -> Option<String> {
    match (numbering, season, episode) {
        (Numbering::Standard, Some(season), Some(episode)) => {
            Some(format!("S{season:02}E{episode:02}"))
        }
        (Numbering::Absolute, Some(number), None) | (Numbering::Absolute, None, Some(number)) => {
            Some(format!("{number:03}"))
        }
        _ => None,
    }
}

/// Make `name` safe to use as a file name on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let name: String = name
        .chars()
        .filter_map(|c| match c {
            '\\' | '/' | '*' => Some('-'),
            ':' | '"' | '<' | '>' | '|' | '?' => None,
            c => Some(c),
        })
        .collect();

    name.trim_matches(|c| c == ' ' || c == '.').to_owned()
}
