//! Built-in classification agents.
//!
//! Each agent is the same [`Pipeline`] with a fixed task and its own
//! chunking and failure defaults. Defaults can be overridden per agent from
//! the `[agents.<name>]` config section and again from the command line.

use promptsieve_chunker::ChunkSize;
use promptsieve_shared::{AppConfig, OnError, PromptSieveError, ReferenceList, Result, Subject};
use tracing::debug;

use crate::pipeline::{ChunkStrategy, FailurePolicy, Pipeline};

const CONTENT_GUARD_TASK: &str = "\
You are AI Content Guard, an AI system designed to detect harmful or
inappropriate content. Your role is to analyze data or content and
identify whether any of the following types of forbidden content are present:

- Abusive content
- Pornographic material
- Discriminatory or exclusive content
- Violent content
- Hate speech
- Promotion of self-harm or suicide
- Drug-related content
- Cyberbullying or harassment
- Terrorism or extremist propaganda
- Graphic violence or gore
- Promotion of illegal activities
- Child exploitation

When analyzing content, if any of these forbidden types are detected,
respond with 'Yes' followed by the specific types of forbidden content
found (e.g., 'Yes: Pornographic material, Hate speech'). If no forbidden
content is found, respond with 'No, no forbidden content found.' Do not
provide any additional explanation or context.";

const TAG_GENERATOR_TASK: &str = "\
You are AI Career Tag generator, an AI system designed to analyze content
and compare it to a list of career titles provided to you.
Your role is to evaluate the content, identify the key skills, topics,
or themes, and determine which careers from the provided list are
relevant to the content.

When analyzing content:

Compare the key skills, topics, or themes in the content to
the careers in the list.
Identify which career titles from the list are relevant to the content.
Respond with the names of the relevant career titles from the list and only
the career-list, or if none are relevant, respond with 'No relevant
careers found.'

Below is the content to be analyzed:";

const URL_FILTER_TASK: &str = "\
You are AI URL Filter, an AI system designed to analyze a list
of URLs and detect any that contain forbidden content. You will scan all
the URLs passed to you and check if they belong to one of the forbidden
categories listed below:

Your task:
Scan all URLs in the list.
Check each URL against the following forbidden categories:
Torrents or Piracy (e.g., torrent, piratebay, crack, keygen)
Social Media or Entertainment (e.g., facebook, instagram, youtube, netflix,
tiktok)
Adult or Explicit Content (e.g., xxx, porn, escort, cams, nsfw)
File Extensions (e.g., .torrent, .exe, .rar, .zip, .iso)
If any URLs contain forbidden content, return a list of those URLs in a
data structure format (e.g., a list or array) without additional explanation
or extra information.
If no forbidden content is found, respond with: 'No forbidden content
detected.'";

const CONTENT_VALIDATOR_TASK: &str = "\
You are AI Content Validator, an AI system designed to analyze content and \
determine whether it is complete or requires more information. Your role is \
to assess data, articles, or any provided content to check if it is fully \
developed or if there are missing elements, missing information, missing \
essay body or missing conclusion.

When analyzing content:

If the content is incomplete or needs more information, respond with 'Yes, more information is needed.'
If the content is complete and no further information is required, respond with 'No, the content is complete.'
Do not provide any additional explanation or context.";

// ---------------------------------------------------------------------------
// AgentKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    /// Flags forbidden content, chunk by chunk.
    ContentGuard,
    /// Matches content against a list of career titles, chunk by chunk.
    TagGenerator,
    /// Flags forbidden URLs in one call.
    UrlFilter,
    /// Judges whether content is complete, in one call.
    ContentValidator,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        Self::ContentGuard,
        Self::TagGenerator,
        Self::UrlFilter,
        Self::ContentValidator,
    ];

    /// Config section key and log name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ContentGuard => "content_guard",
            Self::TagGenerator => "tag_generator",
            Self::UrlFilter => "url_filter",
            Self::ContentValidator => "content_validator",
        }
    }

    pub fn task(self) -> &'static str {
        match self {
            Self::ContentGuard => CONTENT_GUARD_TASK,
            Self::TagGenerator => TAG_GENERATOR_TASK,
            Self::UrlFilter => URL_FILTER_TASK,
            Self::ContentValidator => CONTENT_VALIDATOR_TASK,
        }
    }

    /// Field name reported when the subject is rejected.
    pub fn subject_field(self) -> &'static str {
        match self {
            Self::UrlFilter => "url_list",
            _ => "content",
        }
    }

    /// Whether a career reference list must accompany the subject.
    pub fn needs_reference_list(self) -> bool {
        matches!(self, Self::TagGenerator)
    }

    /// Built-in chunking and failure handling.
    pub fn default_settings(self) -> AgentSettings {
        let word_pack = ChunkStrategy::WordPack(ChunkSize::default());
        match self {
            Self::ContentGuard => AgentSettings {
                chunking: word_pack,
                on_failure: FailurePolicy::sentinel_for(word_pack),
            },
            Self::TagGenerator => AgentSettings {
                chunking: word_pack,
                on_failure: FailurePolicy::Propagate,
            },
            Self::UrlFilter => AgentSettings {
                chunking: ChunkStrategy::Whole,
                on_failure: FailurePolicy::sentinel_for(ChunkStrategy::Whole),
            },
            Self::ContentValidator => AgentSettings {
                chunking: ChunkStrategy::Whole,
                on_failure: FailurePolicy::Propagate,
            },
        }
    }

    /// Built-in settings with config overrides applied.
    pub fn settings(self, config: &AppConfig) -> Result<AgentSettings> {
        let overrides = config.agent(self.name());
        let settings = self
            .default_settings()
            .with_chunk_size(config.chunk_size_for(self.name()))?
            .with_on_error(overrides.on_error, overrides.sentinel);
        debug!(
            agent = self.name(),
            chunking = %settings.chunking.label(),
            policy = settings.on_failure.label(),
            "resolved agent settings"
        );
        Ok(settings)
    }

    /// Assemble the agent's pipeline over `subject`.
    pub fn pipeline(
        self,
        settings: AgentSettings,
        subject: Subject,
        reference: Option<ReferenceList>,
    ) -> Result<Pipeline> {
        let pipeline = Pipeline::new(self.task(), subject)?
            .with_name(self.name())
            .with_chunking(settings.chunking)
            .with_failure_policy(settings.on_failure);

        match reference {
            Some(list) => Ok(pipeline.with_reference_list(list)),
            None if self.needs_reference_list() => Err(PromptSieveError::validation(
                "career_list",
                "Career list must contain valid career titles.",
            )),
            None => Ok(pipeline),
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// AgentSettings
// ---------------------------------------------------------------------------

/// Resolved chunking and failure handling for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub chunking: ChunkStrategy,
    pub on_failure: FailurePolicy,
}

impl AgentSettings {
    /// Set the word-pack budget. The value is validated even for
    /// single-shot agents, whose chunking is left unchanged.
    pub fn with_chunk_size(mut self, raw: i64) -> Result<Self> {
        let size = ChunkSize::new(raw)?;
        if let ChunkStrategy::WordPack(_) = self.chunking {
            self.chunking = ChunkStrategy::WordPack(size);
        }
        Ok(self)
    }

    /// Apply a failure-policy override and/or replacement sentinel text.
    ///
    /// A sentinel text alone only takes effect under the sentinel policy.
    pub fn with_on_error(mut self, on_error: Option<OnError>, sentinel: Option<String>) -> Self {
        let use_sentinel = match on_error {
            Some(OnError::Propagate) => false,
            Some(OnError::Sentinel) => true,
            None => matches!(self.on_failure, FailurePolicy::Sentinel(_)),
        };

        self.on_failure = if use_sentinel {
            match (sentinel, self.on_failure) {
                (Some(text), _) => FailurePolicy::Sentinel(text),
                (None, FailurePolicy::Sentinel(text)) => FailurePolicy::Sentinel(text),
                (None, FailurePolicy::Propagate) => FailurePolicy::sentinel_for(self.chunking),
            }
        } else {
            FailurePolicy::Propagate
        };
        self
    }
}
