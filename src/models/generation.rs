use garde::Validate;

/// Query parameters of a generation request.
///
/// Every field is optional so that a missing parameter becomes a
/// validation error instead of an extractor rejection.
#[derive(Debug, Default, Validate)]
pub struct GenImageQuery {
    /// Shared secret
    #[garde(required, length(min = 1))]
    pub key: Option<String>,

    /// Image description
    #[garde(required, length(min = 1, max = 4000))]
    pub prompt: Option<String>,

    /// Requester identity
    #[garde(required, length(min = 1, max = 320))]
    pub email: Option<String>,
}

/// A validated generation request.
#[derive(Debug, Clone)]
pub struct GenImageRequest {
    pub key: String,
    pub prompt: String,
    pub email: String,
}

impl GenImageQuery {
    /// Parse a raw query string. When a parameter repeats, the first value
    /// wins; unknown parameters are ignored.
    pub fn from_query_string(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let Some(raw) = raw else {
            return query;
        };

        for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let slot = match &*name {
                "key" => &mut query.key,
                "prompt" => &mut query.prompt,
                "email" => &mut query.email,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }

    /// Validate and unwrap into a [`GenImageRequest`].
    ///
    /// The error string lists every offending parameter.
    pub fn into_request(self) -> Result<GenImageRequest, String> {
        self.validate().map_err(|report| {
            report
                .iter()
                .map(|(path, error)| format!("{path}: {error}"))
                .collect::<Vec<_>>()
                .join(", ")
        })?;

        match (self.key, self.prompt, self.email) {
            (Some(key), Some(prompt), Some(email)) => Ok(GenImageRequest { key, prompt, email }),
            _ => Err("key, prompt and email are required".to_string()),
        }
    }
}

/// Everything an approver needs to review one generated image.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub subject: String,
    pub key: String,
    pub email: String,
    pub public_url: String,
    pub approvers: Vec<String>,
}

impl ApprovalRequest {
    pub fn new(request: &GenImageRequest, public_url: &str, approvers: Vec<String>) -> Self {
        Self {
            subject: format!("Verify Gen Image for {}", request.email),
            key: request.key.clone(),
            email: request.email.clone(),
            public_url: public_url.to_string(),
            approvers,
        }
    }
}
