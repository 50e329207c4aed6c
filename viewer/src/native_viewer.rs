use eframe::egui;
use image::RgbImage;
use tracing::debug;

pub fn to_color_image(image: &RgbImage) -> egui::ColorImage {
    let (w, h) = image.dimensions();
    egui::ColorImage::from_rgb([w as usize, h as usize], image.as_raw())
}

pub struct ImageViewer {
    title: String,
    image: Option<egui::ColorImage>,
    texture: Option<egui::TextureHandle>,
}

impl ImageViewer {
    pub fn new(title: &str, image: &RgbImage) -> Self {
        Self {
            title: title.to_string(),
            image: Some(to_color_image(image)),
            texture: None,
        }
    }
}

impl eframe::App for ImageViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(image) = self.image.take() {
            let options = egui::TextureOptions::NEAREST;
            self.texture = Some(ctx.load_texture(&self.title, image, options));
        }

        let key_pressed = ctx.input(|i| {
            i.events
                .iter()
                .any(|e| matches!(e, egui::Event::Key { pressed: true, .. }))
        });
        if key_pressed {
            debug!(title = %self.title, "key pressed, closing viewer");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                if let Some(texture) = &self.texture {
                    ui.image((texture.id(), texture.size_vec2()));
                }
            });
        });
    }
}

/// Launcher; returns when the window closes.
pub fn run_image_viewer(title: &str, image: &RgbImage) -> Result<(), eframe::Error> {
    let (w, h) = image.dimensions();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(title)
            .with_inner_size([w.min(1600) as f32, h.min(1000) as f32]),
        run_and_return: true,
        ..Default::default()
    };

    let viewer = ImageViewer::new(title, image);
    eframe::run_native(title, options, Box::new(|_cc| Ok(Box::new(viewer))))
}
