/// 话题过滤：对关键词做不区分大小写的子串匹配
#[derive(Debug, Clone)]
pub struct ContentFilter {
    denylist: Vec<String>,
}

impl ContentFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denylist: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// 命中的第一个关键词
    pub fn matched_keyword(&self, topic: &str) -> Option<&str> {
        let topic = topic.to_lowercase();
        self.denylist
            .iter()
            .find(|k| topic.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn is_appropriate(&self, topic: &str) -> bool {
        self.matched_keyword(topic).is_none()
    }
}
