use crate::committed::Committed;
use crate::common::{addressed_elements, FftNum};
use crate::config::DeviceInfo;
use crate::error::{FftError, PlanningError};
use crate::{ComplexStorage, Domain, FftDirection, Placement};

/// Where the elements of a batch of transforms live in a buffer: element `e` of transform `b`
/// is at `offset + b * distance + e * stride`, in elements.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Addressing {
    pub offset: usize,
    pub stride: usize,
    pub distance: usize,
}

impl Addressing {
    /// Transforms of `len` elements stored back to back.
    pub fn contiguous(len: usize) -> Self {
        Self {
            offset: 0,
            stride: 1,
            distance: len,
        }
    }
}

/// Describes a batch of transforms. Committing a descriptor plans it for a device.
///
/// `forward_layout` addresses the time-domain data (the input of a forward transform and the
/// output of a backward one), `backward_layout` the frequency-domain data.
#[derive(Clone, PartialEq, Debug)]
pub struct Descriptor {
    pub length: usize,
    pub domain: Domain,
    pub complex_storage: ComplexStorage,
    pub placement: Placement,
    pub number_of_transforms: usize,
    /// Multiplies every output of a forward transform.
    pub forward_scale: f64,
    /// Multiplies every output of a backward transform.
    pub backward_scale: f64,
    pub forward_layout: Addressing,
    pub backward_layout: Addressing,
}

impl Descriptor {
    /// A single unnormalized, out-of-place complex transform of `length` interleaved elements.
    pub fn new(length: usize) -> Self {
        Self {
            length,
            domain: Domain::Complex,
            complex_storage: ComplexStorage::Interleaved,
            placement: Placement::OutOfPlace,
            number_of_transforms: 1,
            forward_scale: 1.0,
            backward_scale: 1.0,
            forward_layout: Addressing::contiguous(length),
            backward_layout: Addressing::contiguous(length),
        }
    }

    pub fn scale(&self, direction: FftDirection) -> f64 {
        match direction {
            FftDirection::Forward => self.forward_scale,
            FftDirection::Inverse => self.backward_scale,
        }
    }

    /// (input, output) addressing of a transform in `direction`.
    pub fn layouts(&self, direction: FftDirection) -> (Addressing, Addressing) {
        match direction {
            FftDirection::Forward => (self.forward_layout, self.backward_layout),
            FftDirection::Inverse => (self.backward_layout, self.forward_layout),
        }
    }

    /// (input, output) element kinds of a transform in `direction`. The frequency domain is
    /// always complex.
    pub fn kinds(&self, direction: FftDirection) -> (Domain, Domain) {
        match direction {
            FftDirection::Forward => (self.domain, Domain::Complex),
            FftDirection::Inverse => (Domain::Complex, self.domain),
        }
    }

    /// Scalars a buffer (or each plane of a split buffer) needs to hold every transform's data
    /// of `kind` at `addressing`. `None` if that overflows `usize`.
    pub(crate) fn required_scalars(&self, addressing: Addressing, kind: Domain) -> Option<usize> {
        let elements = addressed_elements(
            addressing.offset,
            addressing.stride,
            addressing.distance,
            self.length,
            self.number_of_transforms,
        )?;
        match (kind, self.complex_storage) {
            (Domain::Complex, ComplexStorage::Interleaved) => elements.checked_mul(2),
            _ => Some(elements),
        }
    }

    pub fn validate(&self) -> Result<(), PlanningError> {
        let invalid = |reason: &str| Err(PlanningError::InvalidDescriptor(reason.to_string()));

        if self.number_of_transforms == 0 {
            return invalid("number_of_transforms must be positive");
        }
        for layout in [self.forward_layout, self.backward_layout] {
            if layout.stride == 0 {
                return invalid("strides must be positive");
            }
            if layout.distance == 0 && self.number_of_transforms > 1 {
                return invalid("batched transforms need a positive distance");
            }
        }
        let extents = [
            (self.forward_layout, self.domain),
            (self.backward_layout, Domain::Complex),
        ];
        if extents
            .iter()
            .any(|&(layout, kind)| self.required_scalars(layout, kind).is_none())
        {
            return invalid("buffer extent overflows usize");
        }
        if !self.forward_scale.is_finite() || !self.backward_scale.is_finite() {
            return invalid("scales must be finite");
        }
        if self.placement == Placement::InPlace {
            if self.domain == Domain::Real {
                return invalid("in-place real transforms are not supported");
            }
            if self.forward_layout != self.backward_layout {
                return invalid("in-place transforms need identical forward and backward layouts");
            }
        }
        Ok(())
    }

    /// Plans the transform for `device` and precomputes its twiddle factors.
    pub fn commit<T: FftNum>(&self, device: &DeviceInfo) -> Result<Committed<T>, FftError> {
        Committed::new(self.clone(), *device)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let desc = Descriptor::new(64);
        assert!(desc.validate().is_ok());
        assert_eq!(desc.forward_layout, Addressing::contiguous(64));
        assert_eq!(desc.scale(FftDirection::Forward), 1.0);
    }

    #[test]
    fn test_directions() {
        let mut desc = Descriptor::new(8);
        desc.domain = Domain::Real;
        desc.forward_layout.stride = 2;
        desc.backward_scale = 0.125;

        let (input, output) = desc.layouts(FftDirection::Inverse);
        assert_eq!(input, desc.backward_layout);
        assert_eq!(output.stride, 2);
        assert_eq!(desc.kinds(FftDirection::Forward), (Domain::Real, Domain::Complex));
        assert_eq!(desc.kinds(FftDirection::Inverse), (Domain::Complex, Domain::Real));
        assert_eq!(desc.scale(FftDirection::Inverse), 0.125);
    }

    #[test]
    fn test_validation() {
        let check = |modify: &dyn Fn(&mut Descriptor)| {
            let mut desc = Descriptor::new(16);
            modify(&mut desc);
            desc.validate()
        };

        assert!(check(&|d| d.number_of_transforms = 0).is_err());
        assert!(check(&|d| d.forward_layout.stride = 0).is_err());
        assert!(check(&|d| {
            d.number_of_transforms = 2;
            d.backward_layout.distance = 0;
        })
        .is_err());
        assert!(check(&|d| d.forward_scale = f64::NAN).is_err());
        assert!(check(&|d| {
            d.number_of_transforms = 3;
            d.forward_layout.distance = usize::MAX / 2;
        })
        .is_err());
        assert!(check(&|d| d.backward_layout.stride = usize::MAX / 8).is_err());
        assert!(check(&|d| d.forward_layout.offset = usize::MAX / 2).is_err());
        assert!(check(&|d| {
            d.placement = Placement::InPlace;
            d.domain = Domain::Real;
        })
        .is_err());
        assert!(check(&|d| {
            d.placement = Placement::InPlace;
            d.backward_layout.offset = 3;
        })
        .is_err());
        assert!(check(&|d| d.placement = Placement::InPlace).is_ok());
    }
}
