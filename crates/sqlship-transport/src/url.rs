//! Remote URL construction

/// Scheme of every upload URL. Encryption is negotiated explicitly (AUTH TLS).
pub const SCHEME: &str = "ftp";

/// Normalise a remote directory: backslashes become forward slashes, leading
/// and trailing slashes are stripped.
pub fn clean_directory(remote_dir: &str) -> String {
    remote_dir.replace('\\', "/").trim_matches('/').to_string()
}

/// `ftp://host[:port]/[dir/]filename`. A port of 0 is left out.
pub fn build_url(host: &str, port: u16, remote_dir: &str, filename: &str) -> String {
    let mut url = format!("{}://{}", SCHEME, host);
    if port != 0 {
        url.push_str(&format!(":{}", port));
    }
    url.push('/');

    let directory = clean_directory(remote_dir);
    if !directory.is_empty() {
        url.push_str(&directory);
        url.push('/');
    }
    url.push_str(filename);
    url
}
