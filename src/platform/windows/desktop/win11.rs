//! Windows 11 contract (build 22631, revision 3085 and later).
//!
//! Desktops gained names and wallpapers here, and the notification
//! callbacks lost their desktop-array argument.

use super::{
    com_err, desktops_in, fire, index_of, required, HandlerSlot, IApplicationView, Shell,
    VirtualDesktop, CLSID_VIRTUAL_DESKTOP_MANAGER_INTERNAL,
};
use crate::traits::ServiceError;
use log::{debug, warn};
use std::ffi::c_void;
use windows::core::{implement, interface, IUnknown, IUnknown_Vtbl, Interface, GUID, HRESULT};
use windows::Win32::Foundation::{BOOL, S_OK};
use windows::Win32::UI::Shell::Common::IObjectArray;

#[interface("3F07F4BE-B107-441A-AF0F-39D82529072C")]
pub unsafe trait IVirtualDesktop: IUnknown {
    fn IsViewVisible(&self, view: *mut c_void, visible: *mut BOOL) -> HRESULT;
    fn GetId(&self, id: *mut GUID) -> HRESULT;
    fn GetName(&self, name: *mut *mut c_void) -> HRESULT;
    fn GetWallpaperPath(&self, path: *mut *mut c_void) -> HRESULT;
    fn IsRemote(&self, remote: *mut BOOL) -> HRESULT;
}

#[interface("53F5CA0B-158F-4124-900C-057158060B27")]
pub unsafe trait IVirtualDesktopManagerInternal: IUnknown {
    fn GetCount(&self, count: *mut i32) -> HRESULT;
    fn MoveViewToDesktop(&self, view: *mut c_void, desktop: *mut c_void) -> HRESULT;
    fn CanViewMoveDesktops(&self, view: *mut c_void, can_move: *mut BOOL) -> HRESULT;
    fn GetCurrentDesktop(&self, desktop: *mut Option<IVirtualDesktop>) -> HRESULT;
    fn GetDesktops(&self, desktops: *mut Option<IObjectArray>) -> HRESULT;
    fn GetAdjacentDesktop(
        &self,
        from: *mut c_void,
        direction: i32,
        desktop: *mut Option<IVirtualDesktop>,
    ) -> HRESULT;
    fn SwitchDesktop(&self, desktop: *mut c_void) -> HRESULT;
    fn CreateDesktop(&self, desktop: *mut Option<IVirtualDesktop>) -> HRESULT;
}

#[interface("B9E5E94D-233E-49AB-AF5C-2B4541C3AADE")]
pub unsafe trait IVirtualDesktopNotification: IUnknown {
    fn VirtualDesktopCreated(&self, desktop: *mut c_void) -> HRESULT;
    fn VirtualDesktopDestroyBegin(&self, destroyed: *mut c_void, fallback: *mut c_void)
        -> HRESULT;
    fn VirtualDesktopDestroyFailed(&self, destroyed: *mut c_void, fallback: *mut c_void)
        -> HRESULT;
    fn VirtualDesktopDestroyed(&self, destroyed: *mut c_void, fallback: *mut c_void) -> HRESULT;
    fn VirtualDesktopMoved(&self, desktop: *mut c_void, from: i32, to: i32) -> HRESULT;
    fn VirtualDesktopNameChanged(&self, desktop: *mut c_void, name: *mut c_void) -> HRESULT;
    fn ViewVirtualDesktopChanged(&self, view: *mut c_void) -> HRESULT;
    fn CurrentVirtualDesktopChanged(&self, old: *mut c_void, new: *mut c_void) -> HRESULT;
    fn VirtualDesktopWallpaperChanged(&self, desktop: *mut c_void, path: *mut c_void)
        -> HRESULT;
    fn VirtualDesktopSwitched(&self, desktop: *mut c_void) -> HRESULT;
    fn RemoteVirtualDesktopConnected(&self, desktop: *mut c_void) -> HRESULT;
}

impl VirtualDesktop for IVirtualDesktop {
    fn id(&self) -> Result<GUID, ServiceError> {
        let mut id = GUID::zeroed();
        unsafe { self.GetId(&mut id) }
            .ok()
            .map_err(com_err("IVirtualDesktop::GetId"))?;
        Ok(id)
    }
}

fn all_desktops(
    manager: &IVirtualDesktopManagerInternal,
) -> Result<Vec<IVirtualDesktop>, ServiceError> {
    let mut array = None;
    unsafe { manager.GetDesktops(&mut array) }
        .ok()
        .map_err(com_err("GetDesktops"))?;
    desktops_in(&required(array, "GetDesktops")?)
}

/// Receives desktop notifications and reports switches by index.
#[implement(IVirtualDesktopNotification)]
struct Notifier {
    manager: IVirtualDesktopManagerInternal,
    handler: HandlerSlot,
}

impl IVirtualDesktopNotification_Impl for Notifier_Impl {
    unsafe fn VirtualDesktopCreated(&self, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn VirtualDesktopDestroyBegin(&self, _: *mut c_void, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn VirtualDesktopDestroyFailed(&self, _: *mut c_void, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn VirtualDesktopDestroyed(&self, _: *mut c_void, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn VirtualDesktopMoved(&self, _: *mut c_void, _: i32, _: i32) -> HRESULT {
        S_OK
    }

    unsafe fn VirtualDesktopNameChanged(&self, _: *mut c_void, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn ViewVirtualDesktopChanged(&self, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn CurrentVirtualDesktopChanged(&self, _: *mut c_void, new: *mut c_void) -> HRESULT {
        let Some(new) = IVirtualDesktop::from_raw_borrowed(&new) else {
            return S_OK;
        };
        match all_desktops(&self.manager).and_then(|all| index_of(&all, new)) {
            Ok(index) => fire(&self.handler, index),
            Err(e) => warn!("could not resolve the new desktop: {}", e),
        }
        S_OK
    }

    unsafe fn VirtualDesktopWallpaperChanged(&self, _: *mut c_void, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn VirtualDesktopSwitched(&self, _: *mut c_void) -> HRESULT {
        S_OK
    }

    unsafe fn RemoteVirtualDesktopConnected(&self, _: *mut c_void) -> HRESULT {
        S_OK
    }
}

/// Service bound through the Windows 11 interfaces.
pub struct Service {
    shell: Shell,
    manager: IVirtualDesktopManagerInternal,
    _notifier: IVirtualDesktopNotification,
    cookie: u32,
}

impl Service {
    pub(super) fn connect(shell: Shell, handler: HandlerSlot) -> Result<Self, ServiceError> {
        let manager = unsafe {
            shell
                .provider
                .QueryService::<IVirtualDesktopManagerInternal>(
                    &CLSID_VIRTUAL_DESKTOP_MANAGER_INTERNAL,
                )
        }
        .map_err(com_err("QueryService(IVirtualDesktopManagerInternal)"))?;

        let notifier: IVirtualDesktopNotification = Notifier {
            manager: manager.clone(),
            handler,
        }
        .into();
        let cookie = shell.register(notifier.as_raw())?;
        debug!("desktop notifications registered (cookie {})", cookie);

        Ok(Self {
            shell,
            manager,
            _notifier: notifier,
            cookie,
        })
    }

    fn desktop_at(&self, index: usize) -> Result<Option<IVirtualDesktop>, ServiceError> {
        Ok(all_desktops(&self.manager)?.into_iter().nth(index))
    }

    pub fn current_desktop(&self) -> Result<usize, ServiceError> {
        let mut current = None;
        unsafe { self.manager.GetCurrentDesktop(&mut current) }
            .ok()
            .map_err(com_err("GetCurrentDesktop"))?;
        let current = required(current, "GetCurrentDesktop")?;
        index_of(&all_desktops(&self.manager)?, &current)
    }

    pub fn desktop_count(&self) -> Result<usize, ServiceError> {
        let mut count = 0i32;
        unsafe { self.manager.GetCount(&mut count) }
            .ok()
            .map_err(com_err("GetCount"))?;
        Ok(count.max(0) as usize)
    }

    pub fn jump_to(&self, index: usize) -> Result<(), ServiceError> {
        let Some(desktop) = self.desktop_at(index)? else {
            debug!("desktop {} does not exist, not switching", index + 1);
            return Ok(());
        };
        unsafe { self.manager.SwitchDesktop(desktop.as_raw()) }
            .ok()
            .map_err(com_err("SwitchDesktop"))
    }

    pub fn move_focused_window_to(&self, index: usize) -> Result<(), ServiceError> {
        let desktop = self
            .desktop_at(index)?
            .ok_or_else(|| ServiceError::new(format!("desktop {} does not exist", index + 1)))?;
        let id = desktop.id()?;
        self.shell.move_foreground_window(id, |view: &IApplicationView| unsafe {
            self.manager
                .MoveViewToDesktop(view.as_raw(), desktop.as_raw())
                .ok()
        })
    }

    pub fn create_desktop(&self) -> Result<(), ServiceError> {
        let mut created = None;
        unsafe { self.manager.CreateDesktop(&mut created) }
            .ok()
            .map_err(com_err("CreateDesktop"))?;
        required(created, "CreateDesktop").map(|_| ())
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.shell.unregister(self.cookie);
    }
}

