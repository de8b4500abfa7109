use crate::platform::Role;
use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub surface_0: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub accent: Color32,
    pub accent_hover: Color32,
    pub success: Color32,
    pub danger: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub spacing: f32,
    pub radius: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface_0: Color32::from_rgb(0x1F, 0x29, 0x37),
            surface_1: Color32::from_rgb(0x37, 0x41, 0x51),
            surface_2: Color32::from_rgb(0x4B, 0x55, 0x63),
            accent: Color32::from_rgb(0x3B, 0x82, 0xF6),
            accent_hover: Color32::from_rgb(0x1D, 0x4E, 0xD8),
            success: Color32::from_rgb(0x22, 0xC5, 0x5E),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            text_primary: Color32::WHITE,
            text_muted: Color32::from_rgb(0x9C, 0xA3, 0xAF),
            spacing: 8.0,
            radius: 8,
        }
    }
}

impl Theme {
    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_0;
        visuals.window_fill = self.surface_0;
        visuals.override_text_color = Some(self.text_primary);
        visuals.extreme_bg_color = self.surface_2;
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.weak_bg_fill = self.surface_2;
        visuals.widgets.hovered.weak_bg_fill = self.accent_hover;
        visuals.widgets.active.weak_bg_fill = self.accent;
        visuals.selection.bg_fill = self.accent_hover;
        visuals.hyperlink_color = self.accent;

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(self.spacing, self.spacing);
        style.spacing.button_padding = egui::vec2(12.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(22.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        ctx.set_style(style);
    }

    pub fn card_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_1)
            .inner_margin(Margin::same(self.spacing as i8))
            .corner_radius(CornerRadius::same(self.radius))
            .stroke(Stroke::NONE)
    }

    /// Chat bubbles: assistant replies blue, everything else green.
    pub fn bubble_frame(&self, role: Role) -> Frame {
        let fill = match role {
            Role::Assistant => self.accent,
            Role::User | Role::System => self.success,
        };
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(self.spacing as i8))
            .corner_radius(CornerRadius::same(self.radius / 2))
    }

    pub fn action_button(&self, label: &str, fill: Color32) -> egui::Button<'static> {
        egui::Button::new(egui::RichText::new(label.to_string()).color(self.text_primary))
            .fill(fill)
            .corner_radius(CornerRadius::same(self.radius))
    }
}
