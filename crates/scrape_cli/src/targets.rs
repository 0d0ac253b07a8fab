use scrape_core::ScrapeTarget;

/// Targets given directly on the command line, without location tags.
pub fn from_args(urls: &[String]) -> Vec<ScrapeTarget> {
    urls.iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(ScrapeTarget::new)
        .collect()
}

/// Parses a target list with one `url | city | state` entry per line.
///
/// City and state are optional. Blank lines and lines starting with `#` are
/// skipped.
pub fn parse_target_list(text: &str) -> Vec<ScrapeTarget> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<ScrapeTarget> {
    let mut fields = line.split('|').map(str::trim);
    let url = fields.next().filter(|url| !url.is_empty())?;
    let city = fields.next().filter(|c| !c.is_empty()).map(str::to_string);
    let state = fields.next().filter(|s| !s.is_empty()).map(str::to_string);
    Some(ScrapeTarget::new(url).with_context(city, state))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use scrape_core::Platform;

    use super::{from_args, parse_target_list};

    #[test]
    fn list_lines_carry_optional_location() {
        let text = "\
# weekly sweep
https://www.zillow.com/homedetails/1 | Austin | TX

https://www.reddit.com/r/Austin | Austin
https://example.com/blog
";
        let targets = parse_target_list(text);
        assert_eq!(targets.len(), 3);

        assert_eq!(targets[0].platform, Platform::Zillow);
        assert_eq!(targets[0].context.describe().as_deref(), Some("Austin, TX"));
        assert_eq!(targets[1].context.city.as_deref(), Some("Austin"));
        assert_eq!(targets[1].context.state, None);
        assert_eq!(targets[2].platform, Platform::Web);
        assert_eq!(targets[2].context.describe(), None);
    }

    #[test]
    fn lines_without_url_are_skipped() {
        let targets = parse_target_list(" | Austin | TX\n   \n#https://skipped.com");
        assert!(targets.is_empty());
    }

    #[test]
    fn blank_arguments_are_dropped() {
        let urls = vec!["https://a.com".to_string(), "  ".to_string()];
        let targets = from_args(&urls);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].url, "https://a.com");
    }
}
