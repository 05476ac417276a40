//! Streaming HTML rewriting.
//!
//! Documents are never materialized as a tree. The `lol_html` tokenizer emits
//! element events as bytes arrive, and each event is dispatched to the
//! [`ElementVisitor`]s registered for that tag name.
//!
//! # Data Flow
//! ```text
//! upstream body stream
//!     → feeder task (async, forwards chunks)
//!     → rewriter thread (blocking, owns the tokenizer)
//!     → output channel
//!     → client body stream
//! ```
//!
//! The tokenizer is not `Send`, so it lives on a blocking thread for the
//! whole document. Dropping the client body closes the output channel, which
//! stops the rewriter and, through the input channel, the upstream read.

use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, HandlerResult, HtmlRewriter, Settings};
use tokio::sync::mpsc;

use crate::rewrite::resolver::RewriteContext;
use crate::rewrite::script::CLIENT_SCRIPT;

const CHANNEL_DEPTH: usize = 16;

/// Observes and mutates one element without access to the rest of the document.
pub trait ElementVisitor: Send + Sync {
    fn visit(&self, el: &mut Element<'_, '_>, ctx: &RewriteContext) -> HandlerResult;
}

/// Prepends raw markup to the element's children.
#[derive(Debug, Clone, Copy)]
pub struct HeadInjector {
    markup: &'static str,
}

impl HeadInjector {
    pub fn new(markup: &'static str) -> Self {
        Self { markup }
    }
}

impl ElementVisitor for HeadInjector {
    fn visit(&self, el: &mut Element<'_, '_>, _ctx: &RewriteContext) -> HandlerResult {
        el.prepend(self.markup, ContentType::Html);
        Ok(())
    }
}

/// Drops the element entirely.
///
/// Used for `<base>`: references are resolved against the page URL, and a
/// surviving `<base>` would make the browser resolve them differently.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementRemover;

impl ElementVisitor for ElementRemover {
    fn visit(&self, el: &mut Element<'_, '_>, _ctx: &RewriteContext) -> HandlerResult {
        el.remove();
        Ok(())
    }
}

/// Rewrites one URL-carrying attribute through the resolver.
#[derive(Debug, Clone, Copy)]
pub struct AttributeRewriter {
    attribute: &'static str,
}

impl AttributeRewriter {
    pub fn new(attribute: &'static str) -> Self {
        Self { attribute }
    }
}

impl ElementVisitor for AttributeRewriter {
    fn visit(&self, el: &mut Element<'_, '_>, ctx: &RewriteContext) -> HandlerResult {
        let Some(value) = el.get_attribute(self.attribute) else {
            return Ok(());
        };
        if let Some(rewritten) = ctx.rewrite(&value) {
            // A failed rewrite must not abort the rest of the document.
            if let Err(e) = el.set_attribute(self.attribute, &rewritten) {
                tracing::warn!(
                    tag = %el.tag_name(),
                    attribute = self.attribute,
                    error = %e,
                    "Failed to rewrite attribute"
                );
            }
        }
        Ok(())
    }
}

/// Visitors keyed by tag name, applied in registration order.
#[derive(Default)]
pub struct VisitorRegistry {
    visitors: Vec<(&'static str, Box<dyn ElementVisitor>)>,
}

impl VisitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a visitor for every element with the given tag name.
    pub fn on(mut self, tag: &'static str, visitor: impl ElementVisitor + 'static) -> Self {
        self.visitors.push((tag, Box::new(visitor)));
        self
    }

    /// Head hook injection, `<base>` removal and the six URL attributes.
    pub fn standard() -> Self {
        Self::new()
            .on("head", HeadInjector::new(CLIENT_SCRIPT))
            .on("base", ElementRemover)
            .on("a", AttributeRewriter::new("href"))
            .on("img", AttributeRewriter::new("src"))
            .on("script", AttributeRewriter::new("src"))
            .on("link", AttributeRewriter::new("href"))
            .on("form", AttributeRewriter::new("action"))
            .on("iframe", AttributeRewriter::new("src"))
    }

    pub fn len(&self) -> usize {
        self.visitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visitors.is_empty()
    }

    fn settings<'h>(&'h self, ctx: &'h RewriteContext) -> Settings<'h, 'static> {
        let element_content_handlers = self
            .visitors
            .iter()
            .map(|(tag, visitor)| {
                let tag: &str = tag;
                element!(tag, move |el| visitor.visit(el, ctx))
            })
            .collect();

        Settings {
            element_content_handlers,
            ..Settings::default()
        }
    }
}

impl std::fmt::Debug for VisitorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.visitors.iter().map(|(tag, _)| tag))
            .finish()
    }
}

/// Rewrite a complete in-memory document.
pub fn rewrite_document(
    html: &[u8],
    registry: &VisitorRegistry,
    ctx: &RewriteContext,
) -> Result<Vec<u8>, RewritingError> {
    let mut output = Vec::with_capacity(html.len() + CLIENT_SCRIPT.len());
    let mut rewriter = HtmlRewriter::new(registry.settings(ctx), |c: &[u8]| {
        output.extend_from_slice(c)
    });
    rewriter.write(html)?;
    rewriter.end()?;
    Ok(output)
}

/// Rewrite a document while it streams.
///
/// Output chunks are produced as soon as the tokenizer releases them; an
/// upstream read error or a tokenizer failure ends the stream with an error.
pub fn rewrite_stream<S, E>(
    upstream: S,
    registry: Arc<VisitorRegistry>,
    ctx: RewriteContext,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let (input_tx, input_rx) = mpsc::channel::<Result<Bytes, io::Error>>(CHANNEL_DEPTH);
    let (output_tx, output_rx) = mpsc::channel::<Result<Bytes, io::Error>>(CHANNEL_DEPTH);

    let client = output_tx.clone();
    tokio::spawn(async move {
        let mut upstream = std::pin::pin!(upstream);
        loop {
            let next = tokio::select! {
                _ = client.closed() => {
                    tracing::debug!("Client went away, dropping upstream body");
                    break;
                }
                next = upstream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(io::Error::other);
            let failed = chunk.is_err();
            if input_tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    tokio::task::spawn_blocking(move || run_rewriter(input_rx, output_tx, &registry, &ctx));

    futures_util::stream::unfold(output_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

fn run_rewriter(
    mut input: mpsc::Receiver<Result<Bytes, io::Error>>,
    output: mpsc::Sender<Result<Bytes, io::Error>>,
    registry: &VisitorRegistry,
    ctx: &RewriteContext,
) {
    let sink = output.clone();
    let mut rewriter = HtmlRewriter::new(registry.settings(ctx), move |c: &[u8]| {
        if !c.is_empty() {
            let _ = sink.blocking_send(Ok(Bytes::copy_from_slice(c)));
        }
    });

    while let Some(chunk) = input.blocking_recv() {
        if output.is_closed() {
            tracing::debug!(target_url = %ctx.target(), "Client went away, abandoning HTML rewrite");
            return;
        }
        let written = match chunk {
            Ok(bytes) => rewriter
                .write(&bytes)
                .map_err(|e| io::Error::other(e.to_string())),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(target_url = %ctx.target(), error = %e, "HTML rewrite aborted");
            let _ = output.blocking_send(Err(e));
            return;
        }
    }

    if let Err(e) = rewriter.end() {
        tracing::warn!(target_url = %ctx.target(), error = %e, "HTML rewrite failed at end of document");
        let _ = output.blocking_send(Err(io::Error::other(e.to_string())));
    }
}
