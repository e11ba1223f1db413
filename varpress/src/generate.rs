//! Variant generation: adapt one authored module for a target audience.
//!
//! Reads a module's `base.md` and `metadata.yaml`, sends both to the
//! Anthropic Messages API with a structured adaptation prompt, prepends
//! provenance front matter to the result and writes it under the output
//! directory. Every successful generation appends one entry to the ledger
//! (`manifest.yaml` next to the variants), which the publish pipeline later
//! treats as the single source of truth.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use varpress_core::ledger::{self, LedgerEntry};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

const FALLBACK_SYSTEM_PROMPT: &str = "You are a training content adaptation specialist. \
Adapt the provided module for the specified audience. \
Preserve structure, learning objectives, and module ID. \
Return only the adapted Markdown content.";

/// Settings for one generation run.
pub struct GenerateOptions {
    /// Module directory containing `base.md` and `metadata.yaml`.
    pub module: PathBuf,
    /// Audience preset name, or a free-form custom audience.
    pub audience: String,
    /// BCP 47 locale tag for the output.
    pub locale: String,
    /// Output directory for variants and the ledger.
    pub output: PathBuf,
    pub model: String,
}

/// Audience presets injected into the adaptation prompt. Unknown audiences
/// get a generic custom description rather than an error, so new audience
/// types need no code change.
fn audience_profile(audience: &str) -> String {
    match audience {
        "developer" => "Software engineers and technical practitioners who build with LLMs and APIs. \
            They want precision, code examples, edge cases, and integration details. \
            They distrust hand-waving. Show them the mechanism. Assume comfort with \
            technical vocabulary; do not over-explain standard concepts. Favor concrete \
            examples over metaphors."
            .to_string(),
        "executive" => "Senior business leaders who own budget and strategy decisions. They need \
            ROI framing, business outcomes, and risk context. Skip implementation details; \
            translate every feature into business impact. Lead with 'why it matters' before \
            'what it is.' Use industry benchmarks and peer-company examples where relevant."
            .to_string(),
        "champion" => "Internal enablement champions who will train their own teams. They need \
            facilitator notes, discussion prompts, timing guidance, and common participant \
            questions. Preserve all learner-facing content but add [FACILITATOR NOTE] \
            callouts throughout. Frame content from the perspective of someone who will \
            teach it, not just learn it."
            .to_string(),
        "technical-writer" => "Documentation and content professionals learning to work with LLMs. \
            They appreciate analogies to content workflows, structured authoring, and \
            information architecture. Connect AI concepts to their existing mental models \
            (DITA, structured content, single-sourcing, topic-based authoring, CMS workflows)."
            .to_string(),
        custom => format!(
            "Custom audience: '{custom}'. Adapt the content to be most relevant and \
             accessible for this group."
        ),
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Generate one variant. Returns the path of the written variant file.
pub async fn generate(opts: &GenerateOptions) -> Result<PathBuf> {
    let (content, metadata) = load_module(&opts.module)?;
    let system_prompt = load_system_prompt();
    let user_message = build_user_message(&content, &metadata, &opts.audience, &opts.locale)?;

    let api_key = std::env::var("ANTHROPIC_API_KEY").context(
        "ANTHROPIC_API_KEY is not set. Set it in your environment or add it to a .env file.",
    )?;

    println!("  Model : {}", opts.model);
    println!("  Module: {}", opts.module.display());
    println!("  Audience: {}  |  Locale: {}", opts.audience, opts.locale);
    println!("  Calling the completion API...");

    let request = MessagesRequest {
        model: &opts.model,
        max_tokens: MAX_TOKENS,
        system: &system_prompt,
        messages: vec![Message {
            role: "user",
            content: &user_message,
        }],
    };
    let http = reqwest::Client::new();
    let response = http
        .post(MESSAGES_URL)
        .header("x-api-key", &api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&request)
        .send()
        .await
        .context("completion API request failed")?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("completion API returned {status}: {body}");
    }
    let reply: MessagesResponse = response
        .json()
        .await
        .context("failed to decode completion API response")?;
    let adapted = reply
        .content
        .first()
        .map(|block| block.text.clone())
        .unwrap_or_default();
    if adapted.is_empty() {
        bail!("completion API returned no text content");
    }

    let generated_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let front_matter = build_front_matter(&metadata, &opts.audience, &opts.locale, &generated_at)?;

    let module_name = opts
        .module
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());
    let variant_dir = opts.output.join(&module_name);
    std::fs::create_dir_all(&variant_dir)
        .with_context(|| format!("failed to create {}", variant_dir.display()))?;
    let output_file = variant_dir.join(format!("{}-{}.md", opts.audience, opts.locale));
    std::fs::write(&output_file, format!("{front_matter}{adapted}"))
        .with_context(|| format!("failed to write {}", output_file.display()))?;

    let entry = LedgerEntry {
        module_id: yaml_str(&metadata, "id").unwrap_or_else(|| "unknown".to_string()),
        module_path: opts.module.display().to_string(),
        // Generation records no course id; grouping falls back downstream.
        course_id: None,
        audience: opts.audience.clone(),
        locale: opts.locale.clone(),
        output_file: output_file.display().to_string(),
        generated_at,
        model: Some(opts.model.clone()),
        input_tokens: Some(reply.usage.input_tokens),
        output_tokens: Some(reply.usage.output_tokens),
    };
    let manifest_path = opts.output.join("manifest.yaml");
    ledger::append(&manifest_path, entry)
        .with_context(|| format!("failed to update {}", manifest_path.display()))?;
    info!(output = %output_file.display(), "Variant written and ledger updated");

    Ok(output_file)
}

/// Load `base.md` and `metadata.yaml` from the module directory. Both are
/// required; a clear error lists whichever is missing.
fn load_module(module_path: &Path) -> Result<(String, serde_yaml::Value)> {
    let base_path = module_path.join("base.md");
    let meta_path = module_path.join("metadata.yaml");

    let missing: Vec<String> = [&base_path, &meta_path]
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();
    if !missing.is_empty() {
        bail!("required file(s) not found: {}", missing.join(", "));
    }

    let content = std::fs::read_to_string(&base_path)
        .with_context(|| format!("failed to read {}", base_path.display()))?;
    let meta_text = std::fs::read_to_string(&meta_path)
        .with_context(|| format!("failed to read {}", meta_path.display()))?;
    let metadata: serde_yaml::Value =
        serde_yaml::from_str(&meta_text).context("metadata.yaml is not valid YAML")?;
    Ok((content, metadata))
}

/// Load the versioned adaptation system prompt from `prompts/adapt.md`,
/// falling back to a minimal built-in prompt when absent.
fn load_system_prompt() -> String {
    match std::fs::read_to_string("prompts/adapt.md") {
        Ok(prompt) => prompt,
        Err(_) => {
            println!("Warning: prompts/adapt.md not found. Using minimal fallback prompt.");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
    }
}

/// Construct the user-turn message sent to the model.
fn build_user_message(
    content: &str,
    metadata: &serde_yaml::Value,
    audience: &str,
    locale: &str,
) -> Result<String> {
    let audience_description = audience_profile(audience);
    let locale_instruction = if locale != "en-US" {
        format!(
            "\n\n**Locale:** {locale}  \n\
             Translate the output into the target language. Preserve all Markdown \
             formatting and code blocks exactly. Translate comments and string values \
             inside code blocks but never alter code syntax or variable names."
        )
    } else {
        String::new()
    };
    let metadata_block = serde_yaml::to_string(metadata).context("failed to render metadata")?;

    Ok(format!(
        "## Source Module\n\n\
         **Metadata:**\n```yaml\n{metadata_block}```\n\n\
         **Base Content:**\n\n{content}\n\n\
         ---\n\n\
         ## Adaptation Target\n\n\
         **Audience:** `{audience}`\n\
         {audience_description}{locale_instruction}\n\n\
         Generate the adapted module now.\n"
    ))
}

/// Build the YAML front matter prepended to the generated variant.
fn build_front_matter(
    metadata: &serde_yaml::Value,
    audience: &str,
    locale: &str,
    generated_at: &str,
) -> Result<String> {
    use serde_yaml::{Mapping, Value};

    fn copy(meta: &mut Mapping, metadata: &serde_yaml::Value, key: &str, default: Value) {
        let value = metadata.get(key).cloned().unwrap_or(default);
        meta.insert(Value::from(key), value);
    }

    let mut meta = Mapping::new();
    copy(&mut meta, metadata, "id", Value::from("unknown"));
    copy(&mut meta, metadata, "title", Value::from(""));
    copy(&mut meta, metadata, "module_type", Value::from(""));
    copy(&mut meta, metadata, "course_id", Value::from(""));
    copy(&mut meta, metadata, "version", Value::from("1.0"));
    meta.insert(Value::from("audience"), Value::from(audience));
    meta.insert(Value::from("locale"), Value::from(locale));
    copy(&mut meta, metadata, "learning_objectives", Value::Sequence(Vec::new()));
    copy(&mut meta, metadata, "tags", Value::Sequence(Vec::new()));
    meta.insert(Value::from("generated_from"), Value::from("base"));
    meta.insert(Value::from("generated_at"), Value::from(generated_at));

    let body = serde_yaml::to_string(&Value::Mapping(meta))
        .context("failed to render front matter")?;
    Ok(format!("---\n{body}---\n\n"))
}

fn yaml_str(metadata: &serde_yaml::Value, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
