/// Whether dotted `version` is newer than `previous`.  On an equal prefix the
/// longer version wins, so "1.0.1" is newer than "1.0".
pub fn is_newer_version(version: &str, previous: &str) -> bool {
    let version: Vec<u64> = parse(version);
    let previous: Vec<u64> = parse(previous);
    for (i, prev) in previous.iter().enumerate() {
        match version.get(i) {
            None => return false,
            Some(current) if current != prev => return current > prev,
            Some(_) => {}
        }
    }
    version.len() > previous.len()
}

fn parse(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}
