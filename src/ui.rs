//! UI module for the build panel using egui
//!
//! Implements:
//! - Left sidebar: prop picker and build options
//! - Right sidebar: read-out of the current composite

use crafta_props::palette::{SizeTier, NAMED_COLORS};
use crafta_props::{BuildOptions, PropKind};
use egui::{Color32, RichText, Vec2};

/// Theme tags offered in the picker
pub const THEMES: &[&str] = &["basic", "dragon"];

/// UI state for the build panel
pub struct UiState {
    pub left_sidebar_open: bool,
    pub right_sidebar_open: bool,
    pub prop: PropKind,
    pub theme: String,
    pub primary_color: String,
    /// `None` builds with a one-colour scheme
    pub accent_color: Option<String>,
    pub size: SizeTier,
    pub glowing: bool,
    pub magical: bool,
    pub particles_enabled: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(PropKind::Couch, &BuildOptions::default(), true)
    }
}

impl UiState {
    /// Seed the panel from previously used options
    pub fn new(prop: PropKind, options: &BuildOptions, particles_enabled: bool) -> Self {
        let defaults = match prop {
            PropKind::Couch => crafta_props::props::COUCH_DEFAULTS,
            PropKind::Sword => crafta_props::props::SWORD_DEFAULTS,
        };
        let resolved = options.resolve(&defaults);
        let accent = resolved.color_scheme.get(1).cloned();
        Self {
            left_sidebar_open: true,
            right_sidebar_open: true,
            prop,
            theme: resolved.theme.clone(),
            primary_color: resolved.primary_color().to_string(),
            accent_color: accent,
            size: resolved.size,
            glowing: resolved.features.glowing,
            magical: resolved.features.magical,
            particles_enabled,
        }
    }

    /// Options the Build button will use
    pub fn build_options(&self) -> BuildOptions {
        let mut colors = vec![self.primary_color.clone()];
        colors.extend(self.accent_color.clone());
        let mut options = BuildOptions::new()
            .theme(self.theme.clone())
            .colors(colors)
            .size(self.size.name());
        if self.glowing {
            options = options.feature("glowing");
        }
        if self.magical {
            options = options.feature("magical");
        }
        options
    }

    pub fn toggle_left_sidebar(&mut self) {
        self.left_sidebar_open = !self.left_sidebar_open;
    }
}

/// Actions produced by the UI for the app to apply
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    /// Rebuild the scene with these settings
    Build {
        prop: PropKind,
        options: BuildOptions,
        particles: bool,
    },
    /// Remove the current prop
    Clear,
    ResetCamera,
}

/// One part of the current composite
#[derive(Debug, Clone)]
pub struct PartInfo {
    pub name: String,
    pub material: String,
    pub glow: Option<f32>,
}

/// What the right sidebar shows
#[derive(Debug, Clone, Default)]
pub struct SceneInfo {
    pub composite: Option<String>,
    pub parts: Vec<PartInfo>,
    pub triangles: usize,
    pub glow_layers: usize,
    pub live_particles: usize,
    pub particle_support: bool,
    pub callbacks: usize,
}

fn section_label(ui: &mut egui::Ui, text: &str) {
    ui.label(RichText::new(text).size(11.0).color(Color32::from_gray(150)));
    ui.add_space(6.0);
}

fn swatch(rgb: [f32; 3]) -> Color32 {
    let [r, g, b] = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8);
    Color32::from_rgb(r, g, b)
}

fn color_grid(ui: &mut egui::Ui, id: &str, selected: Option<&str>) -> Option<&'static str> {
    let mut picked = None;
    egui::Grid::new(id)
        .spacing(Vec2::new(8.0, 8.0))
        .show(ui, |ui| {
            for (i, (name, rgb)) in NAMED_COLORS.iter().enumerate() {
                let is_selected = selected == Some(*name);
                let size = if is_selected { 36.0 } else { 32.0 };
                let stroke = if is_selected {
                    egui::Stroke::new(2.0, Color32::WHITE)
                } else {
                    egui::Stroke::new(1.0, Color32::from_gray(100))
                };
                let button = egui::Button::new("")
                    .fill(swatch(*rgb))
                    .min_size(Vec2::new(size, size))
                    .stroke(stroke);
                if ui.add(button).on_hover_text(*name).clicked() {
                    picked = Some(*name);
                }
                if (i + 1) % 5 == 0 {
                    ui.end_row();
                }
            }
        });
    picked
}

/// Render the left sidebar (build options)
pub fn render_left_sidebar(ctx: &egui::Context, ui_state: &mut UiState) -> Vec<UiAction> {
    let mut actions = Vec::new();

    egui::Area::new(egui::Id::new("menu_toggle_area"))
        .fixed_pos(egui::pos2(20.0, 20.0))
        .show(ctx, |ui| {
            let button = egui::Button::new(RichText::new("☰").size(24.0).color(Color32::WHITE))
                .fill(Color32::from_rgb(79, 70, 229))
                .min_size(Vec2::new(50.0, 50.0));
            if ui.add(button).clicked() {
                ui_state.toggle_left_sidebar();
            }
        });

    if !ui_state.left_sidebar_open {
        return actions;
    }

    egui::SidePanel::left("build_panel")
        .resizable(false)
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.add_space(10.0);
            ui.horizontal(|ui| {
                ui.add_space(10.0);
                ui.label(RichText::new("🔨 Build").size(18.0).strong().color(Color32::WHITE));
            });
            ui.add_space(10.0);
            ui.separator();
            ui.add_space(10.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                section_label(ui, "PROP");
                ui.horizontal(|ui| {
                    for kind in PropKind::all() {
                        let selected = ui_state.prop == *kind;
                        let fill = if selected {
                            Color32::from_rgb(79, 70, 229)
                        } else {
                            Color32::from_rgba_unmultiplied(255, 255, 255, 13)
                        };
                        let button = egui::Button::new(
                            RichText::new(format!("{} {}", kind.icon(), kind.display_name()))
                                .size(14.0)
                                .color(Color32::from_gray(220)),
                        )
                        .fill(fill)
                        .min_size(Vec2::new(110.0, 36.0));
                        if ui.add(button).clicked() {
                            ui_state.prop = *kind;
                        }
                    }
                });
                ui.add_space(12.0);

                section_label(ui, "THEME");
                ui.horizontal(|ui| {
                    for theme in THEMES {
                        ui.selectable_value(&mut ui_state.theme, theme.to_string(), *theme);
                    }
                });
                ui.add_space(12.0);

                section_label(ui, "MAIN COLOR");
                if let Some(name) = color_grid(ui, "main_colors", Some(ui_state.primary_color.as_str())) {
                    ui_state.primary_color = name.to_string();
                }
                ui.add_space(12.0);

                section_label(ui, "ACCENT COLOR");
                let mut single = ui_state.accent_color.is_none();
                if ui.checkbox(&mut single, "Use main color").changed() {
                    ui_state.accent_color = if single {
                        None
                    } else {
                        Some(ui_state.primary_color.clone())
                    };
                }
                if !single {
                    let current = ui_state.accent_color.clone();
                    if let Some(name) = color_grid(ui, "accent_colors", current.as_deref()) {
                        ui_state.accent_color = Some(name.to_string());
                    }
                }
                ui.add_space(12.0);

                section_label(ui, "SIZE");
                ui.horizontal(|ui| {
                    for tier in SizeTier::all() {
                        ui.selectable_value(&mut ui_state.size, *tier, tier.name());
                    }
                });
                ui.add_space(12.0);

                section_label(ui, "FEATURES");
                ui.checkbox(&mut ui_state.glowing, "✨ Glowing");
                ui.checkbox(&mut ui_state.magical, "🔮 Magical");
                ui.checkbox(&mut ui_state.particles_enabled, "Particle support");
                ui.add_space(20.0);

                let build_button = egui::Button::new(
                    RichText::new(format!("Build {}", ui_state.prop.display_name()))
                        .size(14.0)
                        .color(Color32::WHITE),
                )
                .fill(Color32::from_rgb(34, 197, 94))
                .min_size(Vec2::new(ui.available_width() - 20.0, 40.0));
                if ui.add(build_button).clicked() {
                    actions.push(UiAction::Build {
                        prop: ui_state.prop,
                        options: ui_state.build_options(),
                        particles: ui_state.particles_enabled,
                    });
                }
                ui.add_space(8.0);

                let clear_button = egui::Button::new(
                    RichText::new("🗑️ Clear")
                        .size(14.0)
                        .color(Color32::from_rgb(239, 68, 68)),
                )
                .fill(Color32::from_rgba_unmultiplied(239, 68, 68, 51))
                .min_size(Vec2::new(ui.available_width() - 20.0, 36.0));
                if ui.add(clear_button).clicked() {
                    actions.push(UiAction::Clear);
                }

                ui.add_space(20.0);
                ui.separator();
                ui.add_space(10.0);
                ui.label(RichText::new("Controls:").size(12.0).color(Color32::from_gray(150)));
                ui.label(RichText::new("• Drag to orbit").size(11.0).color(Color32::from_gray(120)));
                ui.label(RichText::new("• Scroll to zoom").size(11.0).color(Color32::from_gray(120)));
                if ui
                    .link(RichText::new("• R to reset camera").size(11.0).color(Color32::from_gray(120)))
                    .clicked()
                {
                    actions.push(UiAction::ResetCamera);
                }
            });
        });

    actions
}

/// Render the right sidebar (scene read-out)
pub fn render_right_sidebar(ctx: &egui::Context, ui_state: &UiState, info: &SceneInfo) {
    if !ui_state.right_sidebar_open {
        return;
    }

    egui::SidePanel::right("scene_panel")
        .resizable(false)
        .default_width(240.0)
        .show(ctx, |ui| {
            ui.add_space(10.0);
            let title = info.composite.as_deref().unwrap_or("Empty scene");
            ui.label(RichText::new(title).size(16.0).strong().color(Color32::WHITE));
            ui.add_space(10.0);
            ui.separator();
            ui.add_space(10.0);

            section_label(ui, "PARTS");
            egui::Grid::new("parts_grid").striped(true).show(ui, |ui| {
                for part in &info.parts {
                    ui.label(part.name.as_str());
                    ui.label(RichText::new(part.material.as_str()).color(Color32::from_gray(170)));
                    match part.glow {
                        Some(intensity) => ui.label(format!("glow {intensity:.1}")),
                        None => ui.label(""),
                    };
                    ui.end_row();
                }
            });
            ui.add_space(12.0);

            section_label(ui, "EFFECTS");
            ui.label(format!("Triangles: {}", info.triangles));
            ui.label(format!("Glow layers: {}", info.glow_layers));
            if info.particle_support {
                ui.label(format!("Live particles: {}", info.live_particles));
            } else {
                ui.label(RichText::new("Particles unavailable").color(Color32::from_gray(120)));
            }
            ui.label(format!("Frame callbacks: {}", info.callbacks));
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_options_from_panel() {
        let mut state = UiState::default();
        state.prop = PropKind::Sword;
        state.primary_color = "gold".to_string();
        state.accent_color = None;
        state.size = SizeTier::Large;
        state.magical = true;

        let options = state.build_options();
        assert_eq!(options.color_scheme, Some(vec!["gold".to_string()]));
        assert_eq!(options.size.as_deref(), Some("large"));
        assert_eq!(options.special_features, Some(vec!["magical".to_string()]));
    }

    #[test]
    fn test_seeded_from_saved_options() {
        let saved = BuildOptions::new().theme("dragon").colors(["green", "white"]);
        let state = UiState::new(PropKind::Couch, &saved, false);
        assert_eq!(state.theme, "dragon");
        assert_eq!(state.primary_color, "green");
        assert_eq!(state.accent_color.as_deref(), Some("white"));
        assert!(!state.particles_enabled);
    }
}
