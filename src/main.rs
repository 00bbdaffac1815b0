/*
    planetor - A live visualizer for the sounds playing on a remote audio engine.
    Copyright (C) 2022  Ryan Andersen

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::time::{Duration, Instant};

use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::{Fullscreen, Window, WindowBuilder};

use planetor::animation::AnimationDriver;
use planetor::app_config::{self, AppConfig};
use planetor::entity::EntityPool;
use planetor::input::{InputSampler, TouchGesture};
use planetor::overlay::DiagnosticOverlay;
use planetor::protocol::{ClientMsg, Snapshot};
use planetor::reconciler::Reconciler;
use planetor::scene::Scene;
use planetor::transport::{TransportAdapter, TransportEvent};

// App constants
const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);
const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);

struct App {
    config: AppConfig,
    pool: EntityPool,
    reconciler: Reconciler,
    driver: AnimationDriver,
    scene: Scene,
    input: InputSampler,
    overlay: DiagnosticOverlay,
    transport: TransportAdapter,

    start: Instant,
    last_idle_pass: f32,
}

impl App {
    fn new(config: AppConfig, window_size: PhysicalSize<u32>) -> Self {
        Self {
            pool: EntityPool::new(config.capacity),
            reconciler: Reconciler::new(&config),
            driver: AnimationDriver::new(&config),
            scene: Scene::new(),
            input: InputSampler::new(window_size),
            overlay: DiagnosticOverlay::default(),
            transport: TransportAdapter::connect(&config.transport),
            config,

            start: Instant::now(),
            last_idle_pass: 0.,
        }
    }

    // Seconds on the clock shared by the reconciler and the animation driver
    fn now(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    fn reconcile(&mut self, snapshot: &Snapshot, now: f32) {
        let pass = self
            .reconciler
            .reconcile(&mut self.pool, snapshot, now, &mut self.scene);
        self.overlay.record_pass(&pass.report, self.pool.len());
    }

    fn handle_transport_events(&mut self, now: f32) {
        for event in self.transport.poll() {
            match event {
                TransportEvent::Snapshot(snapshot) => self.reconcile(&snapshot, now),
                TransportEvent::DebugInfo(data) => self.overlay.record_debug_info(&data),
                TransportEvent::Error(e) => self.overlay.record_error(&e),
                TransportEvent::Opened | TransportEvent::Closed => {}
            }
        }
        self.overlay.set_state(self.transport.state());

        // Without snapshots the pool still has to fade out
        if !self.transport.is_open()
            && now - self.last_idle_pass >= self.config.transport.request_interval.as_secs_f32()
        {
            self.last_idle_pass = now;
            self.reconcile(&Snapshot::empty(), now);
        }
    }

    fn handle_gesture(&mut self, gesture: TouchGesture) {
        if !self.config.interactive() {
            return;
        }
        let msg = match gesture {
            TouchGesture::Began(touch) => self.config.touch.play_command(touch),
            TouchGesture::Ended => ClientMsg::StopAudio,
        };
        log::debug!("Touch sends {msg:?}");
        self.transport.send(msg);
    }

    fn frame(&mut self, window: &Window) {
        let now = self.now();
        self.handle_transport_events(now);
        self.driver
            .frame(&mut self.pool, &self.input, now, &mut self.scene);

        if let Some(title) = self.overlay.take_title() {
            window.set_title(&title);
        }
    }
}

fn toggle_fullscreen(window: &Window, window_is_fullscreen: &mut bool) {
    if *window_is_fullscreen {
        window.set_fullscreen(None);
    } else {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    *window_is_fullscreen = !*window_is_fullscreen;
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Optional config file as the only argument
    let app_config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading config from {path}");
            app_config::parse_file(&path)?
        }
        None => AppConfig::default(),
    };
    log::info!(
        "Using the {:?} profile against {}",
        app_config.profile,
        app_config.transport.endpoint
    );

    // First, create global event loop to manage window events
    let event_loop = EventLoop::new();
    let mut window_is_fullscreen = app_config.launch_fullscreen;
    let window = WindowBuilder::new()
        .with_title("planetor")
        .with_inner_size(LogicalSize::<u32>::from(DEFAULT_WINDOW_SIZE))
        .with_fullscreen(window_is_fullscreen.then_some(Fullscreen::Borderless(None)))
        .build(&event_loop)?;

    let mut app = App::new(app_config, window.inner_size());

    // Run window loop
    log::info!("Begin window loop...");
    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            log::info!("The close button was pressed, exiting");
            control_flow.set_exit();
        }

        // Handle some keyboard input
        Event::WindowEvent {
            event:
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(keycode @ (VirtualKeyCode::F11 | VirtualKeyCode::Escape)),
                            ..
                        },
                    ..
                },
            ..
        } => match keycode {
            VirtualKeyCode::Escape if !window_is_fullscreen => {
                log::info!("The Escape key was pressed, exiting");
                control_flow.set_exit();
            }
            // F11 toggles, Escape only leaves fullscreen
            _ => toggle_fullscreen(&window, &mut window_is_fullscreen),
        },

        // Everything else is sampled by the input state
        Event::WindowEvent { event, .. } => {
            if let Some(gesture) = app.input.handle_window_event(&event) {
                app.handle_gesture(gesture);
            }
        }

        // All UI events have been handled (ie., executes once per frame)
        Event::MainEventsCleared => {
            app.frame(&window);
            control_flow.set_wait_until(Instant::now() + FRAME_INTERVAL);
        }

        Event::LoopDestroyed => app.transport.close(),

        // Catch-all
        _ => {}
    })
}
