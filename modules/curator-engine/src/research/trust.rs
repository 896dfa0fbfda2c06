//! Domain trust tiers. Pure functions of the domain string.

/// User-generated platforms that cannot be cited.
const BLOCKED_DOMAINS: &[&str] = &[
    "namu.wiki", "namuwiki", "tistory.com", "blog.naver.com", "brunch.co.kr", "medium.com",
    "velog.io", "cafe.naver.com", "blog.daum.net",
];

/// Government, academic and journal domains.
const HIGHEST_TRUST_DOMAINS: &[&str] = &[
    ".gov", ".go.kr", "europa.eu", ".edu", ".ac.kr", "scholar.google.com", "arxiv.org",
    "nature.com", "science.org", "ieee.org", "acm.org", "springer.com", "sciencedirect.com",
    "pubmed.ncbi.nlm.nih.gov", "doi.org",
];

/// Established wire services and technology press.
const HIGH_TRUST_DOMAINS: &[&str] = &[
    "reuters.com", "bloomberg.com", "wsj.com", "ft.com", "economist.com", "forbes.com",
    "nytimes.com", "theguardian.com", "bbc.com", "techcrunch.com", "theverge.com", "wired.com",
    "arstechnica.com", "engadget.com", "yna.co.kr", "yonhapnews.co.kr", "zdnet.co.kr",
    "etnews.com", "bloter.net", "hankyung.com", "mk.co.kr",
];

/// First-party vendor and lab sites.
const MEDIUM_TRUST_DOMAINS: &[&str] = &[
    "nvidia.com", "amd.com", "intel.com", "openai.com", "anthropic.com", "google.com",
    "microsoft.com", "apple.com", "meta.com", "deepmind.com", "research.ibm.com",
];

fn is_country_code(label: &str) -> bool {
    label.len() == 2 && label.chars().all(|c| c.is_ascii_lowercase())
}

/// Whether `domain` is `pattern` or a subdomain of it. Patterns starting
/// with `.` are suffixes (TLD-style), optionally followed by a single
/// country-code label (`.gov.uk`, `.edu.au`).
fn domain_matches(domain: &str, pattern: &str) -> bool {
    if pattern.starts_with('.') {
        return domain.ends_with(pattern)
            || domain
                .rsplit_once('.')
                .is_some_and(|(head, tld)| is_country_code(tld) && head.ends_with(pattern));
    }
    domain == pattern
        || domain.ends_with(&format!(".{pattern}"))
        || (!pattern.contains('.') && domain.contains(pattern))
}

/// Trust score 0..=100 for a source domain.
pub fn trust_score(domain: &str) -> u8 {
    let lowered = domain.trim().to_lowercase();
    let domain = lowered.trim_start_matches("www.");
    let any = |list: &[&str]| list.iter().any(|p| domain_matches(domain, p));

    if any(BLOCKED_DOMAINS) {
        0
    } else if any(HIGHEST_TRUST_DOMAINS) {
        100
    } else if any(HIGH_TRUST_DOMAINS) {
        90
    } else if any(MEDIUM_TRUST_DOMAINS) {
        80
    } else if domain.ends_with(".org") {
        60
    } else if domain.ends_with(".com") {
        50
    } else {
        40
    }
}

/// Host of a URL without a leading `www.`; empty when the URL has no host.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
        .unwrap_or_default()
}
