//! Code-generation collaborator.
//!
//! Builds the analyst prompt for a question, obtains candidate code from
//! the chat endpoint (cached), or serves canned responses when running
//! offline. The returned text is free-form: it may or may not be wrapped
//! in a fenced code block, and the analysis layer tolerates both.

use anyhow::Result;
use futures_util::StreamExt;
use tracing::debug;

use crate::{
    cache::RequestCache,
    config::Config,
    dataset::Frame,
    llm::{ChatMessage, ChatOptions, LlmClient, Role, StreamEvent},
};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub caching: bool,
}

/// System role fixing the rules the generated code must follow.
pub fn analyst_role() -> String {
    "You are a data analysis expert.\n\
     The user's dataset is available as a dataframe named 'df'.\n\
     Generate code to analyze the data and create visualizations.\n\
     Use only df, plt (plotting), sns (statistical plots) and st (display output).\n\
     Do not import or use system-level modules; the code runs in a restricted namespace.\n\
     Handle potential errors such as missing columns.\n\
     Return only the code, wrapped in a ```python block."
        .to_string()
}

/// User prompt combining the question with the dataset's shape.
pub fn question_prompt(question: &str, frame: &Frame) -> String {
    format!(
        "The user asked: '{}'.\nThe dataframe 'df' has {} rows and these columns: {}.",
        question,
        frame.n_rows(),
        frame.column_names().join(", ")
    )
}

/// Fetch candidate code from the configured endpoint.
pub async fn generate(
    cfg: &Config,
    question: &str,
    frame: &Frame,
    opts: &GenerateOptions,
) -> Result<String> {
    let client = LlmClient::from_config(cfg)?;
    let base_url = cfg.get("API_BASE_URL").unwrap_or_else(|| "default".into());
    let cache = RequestCache::from_config(cfg);

    let messages = vec![
        ChatMessage::new(Role::System, analyst_role()),
        ChatMessage::new(Role::User, question_prompt(question, frame)),
    ];
    let key = cache.key_for(
        &base_url,
        &opts.model,
        opts.temperature,
        opts.top_p,
        &messages,
    );
    if opts.caching {
        if let Some(text) = cache.get(&key) {
            debug!(%key, "serving generated code from cache");
            return Ok(text);
        }
    }

    let chat_opts = ChatOptions {
        model: opts.model.clone(),
        temperature: opts.temperature,
        top_p: opts.top_p,
        max_tokens: 512,
    };
    let mut stream = client.chat_stream(messages, chat_opts);
    let mut text = String::new();
    while let Some(ev) = stream.next().await {
        if let StreamEvent::Content(t) = ev? {
            text.push_str(&t);
        }
    }
    if opts.caching && !text.is_empty() {
        let _ = cache.set(&key, &text);
    }
    Ok(text)
}

/// Deterministic responses for offline runs. The demo questions come back
/// with real analysis code; anything else explains how to go online.
pub fn canned_response(question: &str) -> String {
    match question.trim().to_lowercase().as_str() {
        "show the average purchase amount by gender" => "```python\n\
             avg_purchase = df.groupby('gender')['purchase_amount'].mean()\n\
             print(\"Female:\", avg_purchase['Female'])\n\
             print(\"Male:\", avg_purchase['Male'])\n\
             ```"
        .to_string(),
        "create a bar plot of purchase amount by category" => "```python\n\
             plt.figure(figsize=(8, 6))\n\
             sns.barplot(x='category', y='purchase_amount', data=df)\n\
             plt.title('Purchase Amount by Category')\n\
             plt.xlabel('Category')\n\
             plt.ylabel('Purchase Amount')\n\
             st.pyplot(plt)\n\
             plt.clf()\n\
             ```"
        .to_string(),
        _ => "```python\n\
             print(\"Offline mode: this question has no canned analysis. Set OPENAI_API_KEY for live generation.\")\n\
             ```"
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::strip_code_fences;

    #[test]
    fn prompt_names_the_columns_and_question() {
        let frame = Frame::from_csv("a,b\n1,2\n".as_bytes()).unwrap();
        let p = question_prompt("Show totals", &frame);
        assert!(p.contains("'Show totals'"));
        assert!(p.contains("a, b"));
        assert!(analyst_role().contains("```python"));
    }

    #[test]
    fn canned_demo_response_strips_to_runnable_code() {
        let raw = canned_response("Show the average purchase amount by gender");
        let code = strip_code_fences(&raw);
        assert!(code.starts_with("avg_purchase"));
        assert!(!code.contains("```"));
    }

    #[test]
    fn unknown_questions_get_the_fallback() {
        let raw = canned_response("What is the meaning of life?");
        assert!(raw.contains("Offline mode"));
    }
}
