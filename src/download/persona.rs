//! Client personas presented to the remote platforms.
//!
//! A persona is plain data: the extractor turns it into yt-dlp flags. Each
//! platform lists its personas mobile-first, since the remote side throttles and
//! challenges app clients and browser clients independently.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: &'static str,
    /// Value for `--extractor-args`
    pub extractor_args: Option<&'static str>,
    pub user_agent: Option<&'static str>,
    pub headers: &'static [(&'static str, &'static str)],
}

impl Persona {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            extractor_args: None,
            user_agent: None,
            headers: &[],
        }
    }

    const fn extractor_args(mut self, args: &'static str) -> Self {
        self.extractor_args = Some(args);
        self
    }

    const fn user_agent(mut self, ua: &'static str) -> Self {
        self.user_agent = Some(ua);
        self
    }

    const fn headers(mut self, headers: &'static [(&'static str, &'static str)]) -> Self {
        self.headers = headers;
        self
    }

    /// yt-dlp arguments for this persona.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(extractor_args) = self.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor_args.to_string());
        }
        if let Some(ua) = self.user_agent {
            args.push("--user-agent".to_string());
            args.push(ua.to_string());
        }
        for (name, value) in self.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }
        args
    }
}

const CHROME_DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const SAFARI_IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
const INSTAGRAM_ANDROID_UA: &str = "Instagram 317.0.0.34.109 Android (33/13; 420dpi; 1080x2340; samsung; SM-S911B; \
     dm1q; qcom; en_US; 562739837)";

const TIKTOK_REFERER: &[(&str, &str)] = &[("Referer", "https://www.tiktok.com/")];

pub static YOUTUBE: &[Persona] = &[
    Persona::new("android").extractor_args("youtube:player_client=android"),
    Persona::new("ios").extractor_args("youtube:player_client=ios"),
    Persona::new("web_safari").extractor_args("youtube:player_client=web_safari"),
    Persona::new("web").extractor_args("youtube:player_client=web"),
];

pub static INSTAGRAM: &[Persona] = &[
    Persona::new("instagram_app").user_agent(INSTAGRAM_ANDROID_UA),
    Persona::new("desktop_browser").user_agent(CHROME_DESKTOP_UA),
];

pub static FACEBOOK: &[Persona] = &[
    Persona::new("mobile_browser").user_agent(SAFARI_IPHONE_UA),
    Persona::new("desktop_browser").user_agent(CHROME_DESKTOP_UA),
];

pub static TIKTOK: &[Persona] = &[
    Persona::new("mobile_browser")
        .user_agent(SAFARI_IPHONE_UA)
        .headers(TIKTOK_REFERER),
    Persona::new("desktop_browser")
        .user_agent(CHROME_DESKTOP_UA)
        .headers(TIKTOK_REFERER),
];
