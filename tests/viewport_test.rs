use room_portfolio::{
    camera::Projection,
    viewport::{ResizeHandler, SurfaceSize, Viewport},
};

fn projection(width: u32, height: u32) -> Projection {
    Projection::new(width, height, cgmath::Deg(75.0f32), 0.1, 1000.0)
}

#[test]
fn resize_sets_aspect_and_surface_size() {
    let handler = ResizeHandler::new(2.0);
    let mut projection = projection(800, 600);

    let size = handler
        .apply(Viewport::new(1920, 1080, 1.0), &mut projection)
        .unwrap();

    assert_eq!(projection.aspect(), 1920.0 / 1080.0);
    assert_eq!(
        size,
        SurfaceSize {
            width: 1920,
            height: 1080,
            pixel_ratio: 1.0
        }
    );
    assert_eq!(size.physical(), (1920, 1080));
}

#[test]
fn pixel_ratio_is_capped() {
    let handler = ResizeHandler::new(2.0);
    let mut projection = projection(800, 600);

    let retina = handler
        .apply(Viewport::new(400, 300, 3.0), &mut projection)
        .unwrap();
    assert_eq!(retina.pixel_ratio, 2.0);
    assert_eq!(retina.physical(), (800, 600));

    let fractional = handler
        .apply(Viewport::new(400, 300, 1.5), &mut projection)
        .unwrap();
    assert_eq!(fractional.pixel_ratio, 1.5);
    assert_eq!(fractional.physical(), (600, 450));
}

#[test]
fn repeated_resizes_are_stable() {
    let handler = ResizeHandler::new(2.0);
    let mut projection = projection(800, 600);
    let viewport = Viewport::new(1280, 720, 1.0);

    let first = handler.apply(viewport, &mut projection);
    let aspect = projection.aspect();
    let second = handler.apply(viewport, &mut projection);

    assert_eq!(first, second);
    assert_eq!(projection.aspect(), aspect);
}

#[test]
fn empty_viewports_are_ignored() {
    let handler = ResizeHandler::new(2.0);
    let mut projection = projection(800, 600);

    assert!(handler
        .apply(Viewport::new(0, 600, 1.0), &mut projection)
        .is_none());
    assert!(handler
        .apply(Viewport::new(800, 0, 1.0), &mut projection)
        .is_none());
    assert_eq!(projection.aspect(), 800.0 / 600.0);
}

#[test]
fn physical_sizes_are_converted_to_logical() {
    let viewport = Viewport::from_physical(winit::dpi::PhysicalSize::new(1600, 1200), 2.0);
    assert_eq!(viewport, Viewport::new(800, 600, 2.0));
    assert!(!viewport.is_empty());
    assert_eq!(viewport.aspect(), 800.0 / 600.0);
}
