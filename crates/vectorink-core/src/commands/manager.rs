//! Command registry and dispatcher.

use super::actions::{ActionButton, ContextAction, layout_actions};
use super::basic::builtin_draw_commands;
use super::select::SelectCommand;
use super::{CmdContext, Command, CommandParams};
use crate::camera::Camera;
use crate::doc::ShapeDoc;
use crate::input::{Motion, Route};
use crate::shapes::ShapeId;
use std::collections::{BTreeMap, HashMap};

/// Builds a fresh command instance.
pub type CommandFactory = fn() -> Box<dyn Command>;

/// Fallback for names without a registered factory.
pub type CommandCreator = Box<dyn FnMut(&str) -> Option<Box<dyn Command>>>;

/// Resolves to the most recently used drawing command.
pub const DRAW_ALIAS: &str = "@draw";
const DEFAULT_DRAW_COMMAND: &str = "splines";
/// Deletes the selection instead of switching when `select` is active.
const ERASE: &str = "erase";
/// Deletes every unlocked shape in the visible window.
const ERASE_WINDOW: &str = "erasewnd";

/// Owns the commands and routes gestures to the active one.
pub struct CmdManager {
    factories: BTreeMap<String, CommandFactory>,
    commands: HashMap<String, Box<dyn Command>>,
    creator: Option<CommandCreator>,
    current: String,
    draw_cmd: String,
    buttons: Vec<ActionButton>,
}

impl Default for CmdManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CmdManager {
    /// Manager with the built-in drawing commands registered.
    pub fn new() -> Self {
        let mut mgr = Self::empty();
        for (name, factory) in builtin_draw_commands() {
            mgr.register_command(name, Some(factory));
        }
        mgr
    }

    /// Manager without registered commands. `select` is still available.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
            commands: HashMap::new(),
            creator: None,
            current: String::new(),
            draw_cmd: String::new(),
            buttons: Vec::new(),
        }
    }

    /// Register or replace a factory. `None` unregisters `name`.
    pub fn register_command(&mut self, name: &str, factory: Option<CommandFactory>) -> bool {
        match factory {
            Some(factory) => {
                if self.factories.get(name).is_some_and(|f| std::ptr::fn_addr_eq(*f, factory)) {
                    return false;
                }
                self.factories.insert(name.to_string(), factory);
                self.commands.remove(name);
                log::debug!("Registered command {}: {}", self.factories.len(), name);
                true
            }
            None => {
                self.commands.remove(name);
                self.factories.remove(name).is_some()
            }
        }
    }

    /// Hook consulted for names that have no registered factory.
    pub fn set_command_creator(&mut self, creator: Option<CommandCreator>) {
        self.creator = creator;
    }

    /// Drop every command instance; the next `set_command` recreates them.
    pub fn unload_commands(&mut self) {
        self.commands.clear();
        self.current.clear();
        self.buttons.clear();
    }

    pub fn command_name(&self) -> &str {
        self.command().map_or("", |cmd| cmd.name())
    }

    /// Name of the `index`-th registered command in name order.
    pub fn command_name_at(&self, index: usize) -> Option<&str> {
        self.factories.keys().nth(index).map(String::as_str)
    }

    /// Name `@draw` currently resolves to.
    pub fn draw_command_name(&self) -> &str {
        if self.draw_cmd.is_empty() {
            DEFAULT_DRAW_COMMAND
        } else {
            &self.draw_cmd
        }
    }

    pub fn command(&self) -> Option<&dyn Command> {
        self.commands.get(&self.current).map(|cmd| cmd.as_ref())
    }

    pub fn command_mut(&mut self) -> Option<&mut (dyn Command + 'static)> {
        self.commands.get_mut(&self.current).map(|cmd| cmd.as_mut())
    }

    fn find_command(&mut self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if self.commands.contains_key(name) {
            return true;
        }
        let cmd = match self.factories.get(name) {
            Some(factory) => Some(factory()),
            None if name == SelectCommand::NAME => Some(Box::new(SelectCommand::new()) as Box<dyn Command>),
            None => {
                let created = self.creator.as_mut().and_then(|create| create(name));
                if created.is_some() {
                    log::debug!("Created command {}: {}", self.commands.len() + 1, name);
                }
                created
            }
        };
        match cmd {
            Some(cmd) => {
                self.commands.insert(name.to_string(), cmd);
                true
            }
            None => false,
        }
    }

    /// Switch to the command `name`. `None` only cancels the current one.
    ///
    /// Unknown names fall back to `select`. A command whose initialization
    /// fails leaves the previous command active, or `select` when there was
    /// none. Returns whether the named
    /// command is now running.
    pub fn set_command(&mut self, ctx: &mut CmdContext, name: Option<&str>, params: &CommandParams) -> bool {
        let Some(name) = name else {
            return self.cancel(ctx);
        };
        let name = if name == DRAW_ALIAS {
            self.draw_command_name().to_string()
        } else {
            name.to_string()
        };
        let found = self.find_command(&name);

        if name == ERASE && self.current == SelectCommand::NAME {
            if let Some(sel) = self.select_mut() {
                if sel.delete_selection(ctx) > 0 {
                    return false;
                }
            }
        }

        self.cancel(ctx);
        let old = self.current.clone();
        let mut ret = false;

        if found {
            self.current = name.clone();
            if let Some(cmd) = self.commands.get_mut(&name) {
                ret = cmd.initialize(ctx, params);
                if !ret {
                    log::debug!("Command {} failed to initialize", name);
                } else if cmd.is_drawing_command() {
                    self.draw_cmd = name.clone();
                }
            }
            if !ret {
                if old != name && self.find_command(&old) {
                    self.current = old.clone();
                } else {
                    self.use_select(ctx, params);
                }
            }
        } else if name == ERASE_WINDOW {
            ret = self.erase_window(ctx) > 0;
        } else {
            log::debug!("Command {} not found, using select", name);
            self.use_select(ctx, params);
        }

        if old != self.current {
            log::debug!("Command changed: {:?} -> {:?}", old, self.current);
        }
        ctx.events.redraw();
        ret
    }

    fn use_select(&mut self, ctx: &mut CmdContext, params: &CommandParams) {
        self.current = SelectCommand::NAME.to_string();
        if self.find_command(SelectCommand::NAME) {
            if let Some(cmd) = self.commands.get_mut(SelectCommand::NAME) {
                cmd.initialize(ctx, params);
            }
        }
    }

    /// Switch to the next registered command, wrapping around.
    pub fn switch_command(&mut self, ctx: &mut CmdContext) -> bool {
        let next = match self.factories.keys().position(|name| *name == self.current) {
            Some(i) => self.command_name_at(i + 1).or_else(|| self.command_name_at(0)),
            None => self.command_name_at(0),
        }
        .map(str::to_string);
        match next {
            Some(name) => self.set_command(ctx, Some(&name), &CommandParams::default()),
            None => false,
        }
    }

    /// Cancel the running command, clear snap feedback and hide context actions.
    pub fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        ctx.snap.clear_snap();
        self.hide_actions();
        ctx.events.show_actions = false;
        match self.command_mut() {
            Some(cmd) => cmd.cancel(ctx),
            None => false,
        }
    }

    /// Run a switch requested by the command during the last call.
    pub fn apply_requested_command(&mut self, ctx: &mut CmdContext) -> bool {
        match ctx.events.next_command.take() {
            Some(name) => self.set_command(ctx, Some(&name), &CommandParams::default()),
            None => false,
        }
    }

    /// Feed one gesture event to the active command.
    pub fn dispatch(&mut self, ctx: &mut CmdContext, m: &Motion, route: Route) -> bool {
        if route == Route::Cancel {
            return self.cancel(ctx);
        }
        if self.command().is_none() {
            self.set_command(ctx, Some(SelectCommand::NAME), &CommandParams::default());
        }
        let Some(cmd) = self.command_mut() else {
            return false;
        };
        let handled = match route {
            Route::Accept => true,
            Route::TouchBegan => cmd.touch_began(ctx, m),
            Route::TouchMoved => cmd.touch_moved(ctx, m),
            Route::TouchEnded => cmd.touch_ended(ctx, m),
            Route::Click => cmd.click(ctx, m),
            Route::DoubleClick => cmd.double_click(ctx, m),
            Route::LongPress => cmd.long_press(ctx, m),
            Route::TwoFingersMove => cmd.two_fingers_move(ctx, m),
            Route::Cancel | Route::Unsupported => false,
        };
        if matches!(route, Route::TouchBegan | Route::Click | Route::DoubleClick) {
            self.hide_actions();
        }
        self.apply_requested_command(ctx);
        handled
    }

    pub fn mouse_hover(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.command_mut().is_some_and(|cmd| cmd.mouse_hover(ctx, m))
    }

    /// The select command, when it is the active one.
    pub fn select(&self) -> Option<&SelectCommand> {
        if self.current != SelectCommand::NAME {
            return None;
        }
        self.command().and_then(|cmd| cmd.as_select())
    }

    pub fn select_mut(&mut self) -> Option<&mut SelectCommand> {
        if self.current != SelectCommand::NAME {
            return None;
        }
        self.commands
            .get_mut(SelectCommand::NAME)
            .and_then(|cmd| cmd.as_select_mut())
    }

    pub fn selected_count(&self) -> usize {
        self.select().map_or(0, SelectCommand::selected_count)
    }

    pub fn selected_id(&self) -> ShapeId {
        self.select().map_or(0, SelectCommand::selected_id)
    }

    pub fn selected_ids(&self) -> Vec<ShapeId> {
        self.select().map(|sel| sel.selected_ids().to_vec()).unwrap_or_default()
    }

    /// Prune selected ids missing from the document, e.g. after undo.
    pub fn sync_selection(&mut self, ctx: &mut CmdContext) -> bool {
        self.commands
            .get_mut(SelectCommand::NAME)
            .and_then(|cmd| cmd.as_select_mut())
            .is_some_and(|sel| sel.sync_selection(ctx))
    }

    /// Context actions offered by the current state.
    pub fn context_actions(&self, doc: &ShapeDoc) -> Vec<ContextAction> {
        match self.select() {
            Some(sel) => ContextAction::available(sel, doc.shapes()),
            None if self.command().is_some_and(|cmd| cmd.is_drawing_command()) => {
                vec![ContextAction::Cancel]
            }
            None => Vec::new(),
        }
    }

    /// Lay out the context actions around the selection box and keep them as shown.
    pub fn show_actions(&mut self, doc: &ShapeDoc, camera: &Camera, factor: f64) -> &[ActionButton] {
        let actions = self.context_actions(doc);
        let selbox = match self.select() {
            Some(sel) => camera.transform().transform_rect_bbox(sel.bounding_box(doc, camera)),
            None => camera.view_rect(),
        };
        self.buttons = layout_actions(&actions, selbox, camera.view_rect(), factor);
        &self.buttons
    }

    pub fn action_buttons(&self) -> &[ActionButton] {
        &self.buttons
    }

    pub fn hide_actions(&mut self) {
        self.buttons.clear();
    }

    /// Perform a context action picked by the user.
    pub fn do_context_action(&mut self, ctx: &mut CmdContext, m: &Motion, action: ContextAction) -> bool {
        self.hide_actions();
        match action {
            ContextAction::Draw => {
                return self.set_command(ctx, Some(DRAW_ALIAS), &CommandParams::default());
            }
            ContextAction::Cancel if self.select().is_none() => {
                let cancelled = self.cancel(ctx);
                if !cancelled {
                    self.set_command(ctx, Some(SelectCommand::NAME), &CommandParams::default());
                }
                return true;
            }
            _ => {}
        }

        let Some(sel) = self.select_mut() else {
            log::debug!("Context action {:?} needs the select command", action);
            return false;
        };
        let done = match action {
            ContextAction::SelectAll => sel.select_all(ctx, m),
            ContextAction::ResetSelection | ContextAction::Cancel => {
                sel.reset_selection(ctx);
                true
            }
            ContextAction::Delete => sel.delete_selection(ctx) > 0,
            ContextAction::Clone => sel.clone_selection(ctx, m),
            ContextAction::FixedLength => sel.set_fixed_length(ctx, m, true),
            ContextAction::FreeLength => sel.set_fixed_length(ctx, m, false),
            ContextAction::Lock => sel.set_locked(ctx, m, true),
            ContextAction::Unlock => sel.set_locked(ctx, m, false),
            ContextAction::EditVertex => sel.set_edit_mode(ctx, m, true),
            ContextAction::HideVertex => sel.set_edit_mode(ctx, m, false),
            ContextAction::Close | ContextAction::Open => sel.switch_closed(ctx, m),
            ContextAction::AddVertex => sel.insert_vertex(ctx, m),
            ContextAction::DeleteVertex => sel.delete_vertex(ctx, m),
            ContextAction::Group => sel.group_selection(ctx, m),
            ContextAction::Ungroup => sel.ungroup_selection(ctx, m),
            ContextAction::Overturn => sel.overturn_polygon(ctx, m),
            ContextAction::Draw => false,
        };
        log::debug!("Context action {:?} done: {}", action, done);
        done
    }

    /// Delete unlocked shapes touching the visible window, as one edit.
    fn erase_window(&mut self, ctx: &mut CmdContext) -> usize {
        if ctx.doc.is_read_only() {
            return 0;
        }
        let window = ctx.camera.model_window();
        let ids: Vec<ShapeId> = ctx
            .shapes()
            .iter()
            .filter(|sp| !sp.is_locked() && sp.hit_test_box(window))
            .map(|sp| sp.id())
            .collect();
        let shapes = ctx.doc.shapes_mut();
        for id in &ids {
            shapes.remove_shape(*id);
        }
        ctx.events.shapes_deleted(&ids);
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CmdEvents, DrawLine};
    use crate::config::EngineConfig;
    use crate::render::Surface;
    use crate::shapes::{BaseRect, RectKind, Shape, ShapeFlags, ShapeKind};
    use crate::snap::SnapEngine;
    use kurbo::{Point, Rect};

    struct Fixture {
        doc: ShapeDoc,
        camera: Camera,
        snap: SnapEngine,
        config: EngineConfig,
        events: CmdEvents,
    }

    impl Fixture {
        fn new() -> Self {
            let config = EngineConfig::default();
            Self {
                doc: ShapeDoc::new(),
                camera: Camera::new(),
                snap: SnapEngine::new(config.snap.clone()),
                config,
                events: CmdEvents::default(),
            }
        }

        fn ctx(&mut self) -> CmdContext<'_> {
            CmdContext {
                doc: &mut self.doc,
                camera: &self.camera,
                snap: &mut self.snap,
                config: &self.config,
                events: &mut self.events,
            }
        }

        fn add_rect(&mut self, rect: Rect) -> ShapeId {
            let sp = Shape::new(ShapeKind::Rect(BaseRect::from_rect(RectKind::Rect, rect)));
            self.doc.shapes_mut().add_shape(&sp)
        }
    }

    struct Refuse;

    impl Command for Refuse {
        fn name(&self) -> &str {
            "refuse"
        }

        fn initialize(&mut self, _ctx: &mut CmdContext, _params: &CommandParams) -> bool {
            false
        }

        fn cancel(&mut self, _ctx: &mut CmdContext) -> bool {
            false
        }

        fn draw(&self, _doc: &ShapeDoc, _camera: &Camera, _snap: &SnapEngine, _surface: &mut dyn Surface) -> bool {
            false
        }
    }

    fn select_with(mgr: &mut CmdManager, ctx: &mut CmdContext, id: ShapeId) {
        let params = CommandParams {
            id: Some(id),
            ..Default::default()
        };
        assert!(mgr.set_command(ctx, Some("select"), &params));
        assert_eq!(mgr.selected_id(), id);
    }

    #[test]
    fn test_registry_is_name_ordered() {
        let mut mgr = CmdManager::new();
        assert_eq!(mgr.command_name_at(0), Some("circle"));
        assert_eq!(mgr.command_name_at(10), Some("square"));
        assert_eq!(mgr.command_name_at(11), None);

        assert!(mgr.register_command("circle", None));
        assert!(!mgr.register_command("circle", None));
        assert_eq!(mgr.command_name_at(0), Some("diamond"));
    }

    #[test]
    fn test_unknown_command_falls_back_to_select() {
        let mut f = Fixture::new();
        let mut mgr = CmdManager::new();
        let mut ctx = f.ctx();
        assert!(!mgr.set_command(&mut ctx, Some("no-such-tool"), &CommandParams::default()));
        assert_eq!(mgr.command_name(), "select");
    }

    #[test]
    fn test_draw_alias_remembers_last_drawing_command() {
        let mut f = Fixture::new();
        let mut mgr = CmdManager::new();
        let mut ctx = f.ctx();
        assert!(mgr.set_command(&mut ctx, Some(DRAW_ALIAS), &CommandParams::default()));
        assert_eq!(mgr.command_name(), "splines");

        mgr.set_command(&mut ctx, Some("rect"), &CommandParams::default());
        mgr.set_command(&mut ctx, Some("select"), &CommandParams::default());
        assert!(mgr.set_command(&mut ctx, Some(DRAW_ALIAS), &CommandParams::default()));
        assert_eq!(mgr.command_name(), "rect");
    }

    #[test]
    fn test_failed_initialize_keeps_previous() {
        let mut f = Fixture::new();
        let mut mgr = CmdManager::new();
        mgr.register_command("refuse", Some(|| Box::new(Refuse)));
        let mut ctx = f.ctx();
        mgr.set_command(&mut ctx, Some("line"), &CommandParams::default());
        assert!(!mgr.set_command(&mut ctx, Some("refuse"), &CommandParams::default()));
        assert_eq!(mgr.command_name(), "line");
    }

    #[test]
    fn test_failed_first_command_uses_select() {
        let mut f = Fixture::new();
        let mut mgr = CmdManager::new();
        mgr.register_command("refuse", Some(|| Box::new(Refuse)));
        let mut ctx = f.ctx();
        assert!(!mgr.set_command(&mut ctx, Some("refuse"), &CommandParams::default()));
        assert_eq!(mgr.command_name(), "select");
        assert!(mgr.select().is_some());
    }

    #[test]
    fn test_switch_command_wraps() {
        let mut f = Fixture::new();
        let mut mgr = CmdManager::new();
        let mut ctx = f.ctx();
        mgr.switch_command(&mut ctx);
        assert_eq!(mgr.command_name(), "circle");
        mgr.set_command(&mut ctx, Some("square"), &CommandParams::default());
        mgr.switch_command(&mut ctx);
        assert_eq!(mgr.command_name(), "circle");
        mgr.switch_command(&mut ctx);
        assert_eq!(mgr.command_name(), "diamond");
    }

    #[test]
    fn test_creator_hook() {
        let mut f = Fixture::new();
        let mut mgr = CmdManager::empty();
        mgr.set_command_creator(Some(Box::new(|name: &str| {
            (name == "ext").then(|| Box::new(DrawLine::new()) as Box<dyn Command>)
        })));
        let mut ctx = f.ctx();
        assert!(mgr.set_command(&mut ctx, Some("ext"), &CommandParams::default()));
        assert_eq!(mgr.command_name(), "line");
    }

    #[test]
    fn test_erase_in_select_deletes_selection() {
        let mut f = Fixture::new();
        let id = f.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut mgr = CmdManager::new();
        let mut ctx = f.ctx();
        select_with(&mut mgr, &mut ctx, id);

        assert!(!mgr.set_command(&mut ctx, Some("erase"), &CommandParams::default()));
        assert_eq!(mgr.command_name(), "select");
        assert!(f.doc.shapes().is_empty());
        assert_eq!(f.events.deleted, vec![id]);
    }

    #[test]
    fn test_erase_window_skips_locked() {
        let mut f = Fixture::new();
        f.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut locked = Shape::new(ShapeKind::Rect(BaseRect::from_rect(RectKind::Rect, Rect::new(20.0, 20.0, 30.0, 30.0))));
        locked.flags.set(ShapeFlags::LOCKED, true);
        let keep = f.doc.shapes_mut().add_shape(&locked);
        let mut mgr = CmdManager::new();
        let mut ctx = f.ctx();
        assert!(mgr.set_command(&mut ctx, Some("erasewnd"), &CommandParams::default()));
        assert_eq!(f.doc.shapes().ids(), &[keep]);
        assert_eq!(f.events.changes, 1);
    }

    #[test]
    fn test_context_actions_for_selection() {
        let mut f = Fixture::new();
        let id = f.add_rect(Rect::new(100.0, 100.0, 200.0, 150.0));
        let mut mgr = CmdManager::new();
        {
            let mut ctx = f.ctx();
            select_with(&mut mgr, &mut ctx, id);
        }
        let actions = mgr.context_actions(&f.doc);
        assert_eq!(actions.first(), Some(&ContextAction::Delete));
        assert!(actions.contains(&ContextAction::Lock));
        assert!(!actions.contains(&ContextAction::Group));

        let n = mgr.show_actions(&f.doc, &f.camera, 1.0).len();
        assert_eq!(n, actions.len());
        let view = f.camera.view_rect();
        assert!(mgr.action_buttons().iter().all(|b| view.contains_rect(b.rect(1.0))));

        let mut ctx = f.ctx();
        mgr.cancel(&mut ctx);
        assert!(mgr.action_buttons().is_empty());
    }

    #[test]
    fn test_do_context_action_delete_and_draw() {
        let mut f = Fixture::new();
        let id = f.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut mgr = CmdManager::new();
        let mut ctx = f.ctx();
        mgr.set_command(&mut ctx, Some("ellipse"), &CommandParams::default());
        select_with(&mut mgr, &mut ctx, id);

        let m = Motion::at_model(Point::new(5.0, 5.0), ctx.mm_to_model(1.0));
        assert!(mgr.do_context_action(&mut ctx, &m, ContextAction::Delete));
        assert!(ctx.shapes().is_empty());
        assert_eq!(mgr.selected_count(), 0);

        assert!(mgr.do_context_action(&mut ctx, &m, ContextAction::Draw));
        assert_eq!(mgr.command_name(), "ellipse");
        assert!(!mgr.do_context_action(&mut ctx, &m, ContextAction::Group));
    }

    #[test]
    fn test_dispatch_click_switches_to_select() {
        let mut f = Fixture::new();
        let id = f.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut mgr = CmdManager::new();
        let mut ctx = f.ctx();
        mgr.set_command(&mut ctx, Some("line"), &CommandParams::default());

        let m = Motion::at_model(Point::new(0.0, 5.0), ctx.mm_to_model(1.0));
        assert!(mgr.dispatch(&mut ctx, &m, Route::Click));
        assert_eq!(mgr.command_name(), "select");
        assert_eq!(mgr.selected_ids(), vec![id]);
    }

    #[test]
    fn test_sync_selection_after_external_delete() {
        let mut f = Fixture::new();
        let id = f.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut mgr = CmdManager::new();
        {
            let mut ctx = f.ctx();
            select_with(&mut mgr, &mut ctx, id);
        }
        f.doc.shapes_mut().remove_shape(id);
        f.events = CmdEvents::default();
        let mut ctx = f.ctx();
        assert!(mgr.sync_selection(&mut ctx));
        assert_eq!(mgr.selected_count(), 0);
        assert!(f.events.selection_changed);
    }
}
