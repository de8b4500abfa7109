use crate::chat::{ChatSession, Message};
use crate::event::{AppEvent, Panel};
use crate::files::{FileDialogs, OpenedFile};
use crate::platform::Identity;
use crate::redaction::RedactionPolicy;
use crate::resource::{RemoteResourceViewModel, ResourceCollection};
use crate::session_gate::SessionGate;
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use serde_json::Value;
use std::future::Future;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Hands an event to the UI thread. Returns false once the window is gone.
fn deliver(tx: &Sender<AppEvent>, event: AppEvent) -> bool {
    if tx.send(event).is_err() {
        debug!("window closed before event delivery");
        return false;
    }
    true
}

/// The view-models the window is built on.
pub struct ViewModels {
    pub gate: Arc<SessionGate>,
    pub resources: Arc<RemoteResourceViewModel>,
    pub chat: Arc<ChatSession>,
    pub files: Arc<FileDialogs>,
    pub redaction: RedactionPolicy,
}

pub struct ExplorerApp {
    rx: Receiver<AppEvent>,
    tx: Sender<AppEvent>,
    runtime: Handle,
    models: ViewModels,
    theme: Theme,
    identity: Option<Identity>,
    auto_sign_in: bool,
    signing_in: bool,
    auth_error: Option<String>,
    transcript: Vec<Message>,
    current_message: String,
    chat_error: Option<String>,
    entries: ResourceCollection,
    new_key: String,
    new_value: String,
    kv_error: Option<String>,
    kv_busy: bool,
    file: OpenedFile,
    file_error: Option<String>,
    diagnostics_log: Vec<String>,
}

impl ExplorerApp {
    pub fn new(runtime: Handle, models: ViewModels, ctx: &egui::Context) -> Self {
        let (tx, rx) = mpsc::channel();
        let theme = Theme::default();
        theme.apply_visuals(ctx);
        Self {
            rx,
            tx,
            runtime,
            models,
            theme,
            identity: None,
            auto_sign_in: true,
            signing_in: false,
            auth_error: None,
            transcript: Vec::new(),
            current_message: String::new(),
            chat_error: None,
            entries: ResourceCollection::default(),
            new_key: String::new(),
            new_value: String::new(),
            kv_error: None,
            kv_busy: false,
            file: OpenedFile::default(),
            file_error: None,
            diagnostics_log: Vec::new(),
        }
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    /// Runs `work` on the runtime and hands its event back to the UI thread.
    fn spawn<F>(&self, ctx: &egui::Context, work: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            deliver(&tx, work.await);
            ctx.request_repaint();
        });
    }

    fn start_sign_in(&mut self, ctx: &egui::Context) {
        self.signing_in = true;
        self.auth_error = None;
        let gate = Arc::clone(&self.models.gate);
        let resources = Arc::clone(&self.models.resources);
        let tx = self.tx.clone();
        self.spawn(ctx, async move {
            let identity = match gate.ensure_signed_in().await {
                Ok(identity) => identity,
                Err(err) => return AppEvent::failed(Panel::Session, &err),
            };
            deliver(&tx, AppEvent::SignedIn(identity));
            match resources.list().await {
                Ok(collection) => AppEvent::EntriesLoaded(collection),
                Err(err) => AppEvent::failed(Panel::KeyValue, &err),
            }
        });
    }

    fn sign_out(&mut self, ctx: &egui::Context) {
        let gate = Arc::clone(&self.models.gate);
        self.spawn(ctx, async move {
            match gate.sign_out().await {
                Ok(()) => AppEvent::SignedOut,
                Err(err) => AppEvent::failed(Panel::Session, &err),
            }
        });
    }

    fn submit_message(&mut self, ctx: &egui::Context) {
        self.chat_error = None;
        let chat = Arc::clone(&self.models.chat);
        let text = self.current_message.clone();
        self.spawn(ctx, async move {
            match chat.send(&text).await {
                Ok(outcome) => AppEvent::ChatReplied(outcome),
                Err(err) => AppEvent::failed(Panel::Chat, &err),
            }
        });
    }

    fn submit_entry(&mut self, ctx: &egui::Context) {
        self.kv_error = None;
        self.kv_busy = true;
        let resources = Arc::clone(&self.models.resources);
        let key = self.new_key.clone();
        let value = Value::String(self.new_value.clone());
        self.spawn(ctx, async move {
            match resources.upsert(&key, value).await {
                Ok(collection) => AppEvent::EntryWritten(collection),
                Err(err) => AppEvent::failed(Panel::KeyValue, &err),
            }
        });
    }

    fn delete_entry(&mut self, ctx: &egui::Context, key: String) {
        self.kv_error = None;
        self.kv_busy = true;
        let resources = Arc::clone(&self.models.resources);
        self.spawn(ctx, async move {
            match resources.remove(&key).await {
                Ok(collection) => AppEvent::EntriesLoaded(collection),
                Err(err) => AppEvent::failed(Panel::KeyValue, &err),
            }
        });
    }

    fn open_file(&mut self, ctx: &egui::Context) {
        self.file_error = None;
        let files = Arc::clone(&self.models.files);
        self.spawn(ctx, async move {
            match files.open().await {
                Ok(file) => AppEvent::FileOpened(file),
                Err(err) => AppEvent::failed(Panel::Files, &err),
            }
        });
    }

    fn save_file(&mut self, ctx: &egui::Context) {
        self.file_error = None;
        let files = Arc::clone(&self.models.files);
        self.spawn(ctx, async move {
            match files.save().await {
                Ok(file) => AppEvent::FileSaved(file),
                Err(err) => AppEvent::failed(Panel::Files, &err),
            }
        });
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
        // The transcript grows as soon as a send starts, before its event arrives.
        self.transcript = self.models.chat.transcript();
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SignedIn(identity) => {
                self.log_diagnostic(format!("signed in as {}", identity.username));
                self.identity = Some(identity);
                self.signing_in = false;
                self.auth_error = None;
            }
            AppEvent::SignedOut => {
                self.log_diagnostic("signed out");
                self.identity = None;
                self.auto_sign_in = false;
                self.entries = ResourceCollection::default();
            }
            AppEvent::EntriesLoaded(collection) => {
                self.kv_busy = false;
                self.log_diagnostic(format!("loaded {} entries", collection.entries.len()));
                self.entries = collection;
            }
            AppEvent::EntryWritten(collection) => {
                self.kv_busy = false;
                self.new_key.clear();
                self.new_value.clear();
                self.entries = collection;
            }
            AppEvent::ChatReplied(outcome) => {
                self.current_message.clear();
                if let Some(err) = outcome.speech_error {
                    self.log_diagnostic(format!("speech unavailable: {err}"));
                }
            }
            AppEvent::FileOpened(file) => {
                self.log_diagnostic(format!("opened {}", file.name));
                self.file = file;
            }
            AppEvent::FileSaved(file) => {
                self.log_diagnostic(format!("saved {}", file.name));
                self.file = file;
            }
            AppEvent::DialogCancelled(panel) => {
                debug!(panel = panel.as_str(), "dialog cancelled");
            }
            AppEvent::Failed {
                panel,
                message,
                blocking,
                written,
            } => {
                warn!(panel = panel.as_str(), %message, "operation failed");
                self.log_diagnostic(format!("{} error: {message}", panel.as_str()));
                if blocking {
                    self.signing_in = false;
                    self.auth_error = Some(message);
                    return;
                }
                match panel {
                    Panel::Session => self.auth_error = Some(message),
                    Panel::Chat => self.chat_error = Some(message),
                    Panel::Files => self.file_error = Some(message),
                    Panel::KeyValue => {
                        self.kv_busy = false;
                        if written {
                            self.new_key.clear();
                            self.new_value.clear();
                        }
                        self.entries = self.models.resources.snapshot();
                        self.kv_error = Some(message);
                    }
                }
            }
        }
    }

    fn inline_error(ui: &mut egui::Ui, error: &Option<String>, color: Color32) {
        if let Some(message) = error {
            ui.label(RichText::new(message).color(color));
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let mut sign_out = false;
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading("Platform Explorer");
            });
            ui.horizontal(|ui| {
                match &self.identity {
                    Some(identity) => {
                        ui.label(format!("Welcome, {}", identity.username));
                        sign_out = ui.button("Sign out").clicked();
                    }
                    None => {
                        ui.label(RichText::new("Not signed in").color(self.theme.text_muted));
                    }
                }
            });
        });
        if sign_out {
            self.sign_out(ctx);
        }
    }

    fn render_sign_in_gate(&mut self, ctx: &egui::Context) {
        let mut retry = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(80.0);
                if self.signing_in {
                    ui.spinner();
                    ui.label("Waiting for sign-in...");
                    return;
                }
                if let Some(message) = &self.auth_error {
                    ui.label(RichText::new(message).color(self.theme.danger));
                }
                retry = ui
                    .add(self.theme.action_button("Sign in", self.theme.accent))
                    .clicked();
            });
        });
        if retry {
            self.start_sign_in(ctx);
        }
    }

    fn render_chat(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.label("Chat with audio response:");
        let theme = self.theme.clone();
        theme.card_frame().show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("chat_transcript")
                .max_height(190.0)
                .stick_to_bottom(true)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for message in &self.transcript {
                        theme.bubble_frame(message.role).show(ui, |ui| {
                            ui.set_width(ui.available_width());
                            ui.label(message.content.as_str());
                        });
                    }
                });
        });

        let sending = self.models.chat.is_sending();
        let hint = if sending {
            "Waiting for response..."
        } else {
            "Type a message..."
        };
        let mut send_now = false;
        let response = ui.add_enabled(
            !sending,
            egui::TextEdit::singleline(&mut self.current_message)
                .desired_width(f32::INFINITY)
                .hint_text(hint),
        );
        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send_now = true;
        }
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            send_now |= ui
                .add_enabled(!sending, theme.action_button("Send", theme.accent))
                .clicked();
        });
        Self::inline_error(ui, &self.chat_error, theme.danger);

        if send_now && !sending {
            self.submit_message(ctx);
        }
    }

    fn render_files(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.label("File Dialog Demo:");
        let theme = self.theme.clone();
        let (mut open, mut save) = (false, false);
        ui.horizontal(|ui| {
            open = ui.add(theme.action_button("Open File", theme.accent)).clicked();
            save = ui.add(theme.action_button("Save File", theme.success)).clicked();
        });
        theme.card_frame().show(ui, |ui| {
            ui.set_width(ui.available_width());
            ScrollArea::vertical()
                .id_salt("file_content")
                .max_height(110.0)
                .show(ui, |ui| {
                    if !self.file.name.is_empty() {
                        ui.label(format!("File Name: {}", self.file.name));
                    }
                    if !self.file.content.is_empty() {
                        ui.label(format!("File Content: {}", self.file.content));
                    }
                });
        });
        Self::inline_error(ui, &self.file_error, theme.danger);

        if open {
            self.open_file(ctx);
        }
        if save {
            self.save_file(ctx);
        }
    }

    fn render_key_values(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.label("Key-Value Pairs:");
            if self.entries.stale {
                ui.label(RichText::new("(not yet refreshed)").color(self.theme.text_muted));
            }
        });
        let theme = self.theme.clone();
        let mut delete: Option<String> = None;
        theme.card_frame().show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("key_values")
                .max_height(190.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for entry in &self.entries.entries {
                        ui.horizontal(|ui| {
                            ui.monospace(self.models.redaction.display_entry(entry));
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    if ui
                                        .add_enabled(
                                            !self.kv_busy,
                                            theme.action_button("Delete", theme.danger),
                                        )
                                        .clicked()
                                    {
                                        delete = Some(entry.key.clone());
                                    }
                                },
                            );
                        });
                    }
                });
        });

        let mut submit = false;
        ui.horizontal(|ui| {
            let field_width = (ui.available_width() - 120.0).max(120.0) / 2.0;
            ui.add(
                egui::TextEdit::singleline(&mut self.new_key)
                    .desired_width(field_width)
                    .hint_text("Key"),
            );
            ui.add(
                egui::TextEdit::singleline(&mut self.new_value)
                    .desired_width(field_width)
                    .hint_text("Value"),
            );
            submit = ui
                .add_enabled(!self.kv_busy, theme.action_button("Add/Update", theme.success))
                .clicked();
        });
        Self::inline_error(ui, &self.kv_error, theme.danger);

        if let Some(key) = delete {
            self.delete_entry(ctx, key);
        }
        if submit {
            self.submit_entry(ctx);
        }
    }

    fn render_diagnostics(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("diagnostics").show(ctx, |ui| {
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });
        });
    }
}

impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.auto_sign_in && self.identity.is_none() && !self.signing_in {
            self.auto_sign_in = false;
            self.start_sign_in(ctx);
        }
        self.drain_events();
        self.render_top_bar(ctx);
        self.render_diagnostics(ctx);

        if self.identity.is_none() || self.auth_error.is_some() {
            self.render_sign_in_gate(ctx);
            return;
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ScrollArea::vertical()
                .id_salt("main_column")
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    self.render_chat(ui, ctx);
                    ui.separator();
                    self.render_files(ui, ctx);
                    ui.separator();
                    self.render_key_values(ui, ctx);
                });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_reports_a_closed_window() {
        let (tx, rx) = mpsc::channel();
        assert!(deliver(&tx, AppEvent::SignedOut));
        assert!(matches!(rx.try_recv(), Ok(AppEvent::SignedOut)));

        drop(rx);
        assert!(!deliver(&tx, AppEvent::SignedOut));
    }
}
