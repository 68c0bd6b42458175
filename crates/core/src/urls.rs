use url::Url;

const DRIVE_HOST: &str = "drive.google.com";

/// Rewrites Google Drive share links into direct download links so the audio
/// engine and the art loader can stream them. Anything else is returned as is.
pub fn direct_media_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    if parsed.host_str() != Some(DRIVE_HOST) {
        return raw.to_string();
    }

    let already_direct = parsed.path().starts_with("/uc")
        && parsed.query_pairs().any(|(k, _)| k == "export");
    if already_direct {
        return raw.to_string();
    }

    match drive_file_id(&parsed) {
        Some(id) => format!("https://{DRIVE_HOST}/uc?export=view&id={id}"),
        None => raw.to_string(),
    }
}

fn drive_file_id(url: &Url) -> Option<String> {
    let from_query = url
        .query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned());

    let from_path = || {
        let mut segments = url.path_segments()?;
        segments.find(|s| *s == "d")?;
        segments.next().map(str::to_string)
    };

    from_query
        .or_else(from_path)
        .filter(|id| !id.is_empty() && id.chars().all(is_id_char))
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::direct_media_url;

    #[test]
    fn rewrites_drive_share_formats() {
        let want = "https://drive.google.com/uc?export=view&id=1AbC_d-9";
        assert_eq!(
            direct_media_url("https://drive.google.com/file/d/1AbC_d-9/view?usp=sharing"),
            want
        );
        assert_eq!(direct_media_url("https://drive.google.com/open?id=1AbC_d-9"), want);
        assert_eq!(direct_media_url("https://drive.google.com/uc?id=1AbC_d-9"), want);
    }

    #[test]
    fn leaves_direct_and_foreign_links_alone() {
        let direct = "https://drive.google.com/uc?export=download&id=xyz";
        assert_eq!(direct_media_url(direct), direct);

        let other = "https://cdn.example.com/track?id=42";
        assert_eq!(direct_media_url(other), other);

        assert_eq!(direct_media_url(""), "");
        assert_eq!(direct_media_url("not a url"), "not a url");
    }
}
